use downloader_client_rs::ClientConfig;

#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub client: ClientConfig,
    pub debug: bool,
}
