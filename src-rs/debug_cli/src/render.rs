use std::io::{self, Write};

use downloader_client_rs::api::{ForumTopic, ForumTopicDetail};
use downloader_client_rs::task::{artifact_url, FormatDescriptor};
use downloader_client_rs::{ClientError, JobRecord, JobStatus, Session, SessionPhase};

use crate::models::ConsoleConfig;

pub fn banner(cfg: &ConsoleConfig) {
    println!("Downloader Console");
    println!("API: {}", cfg.client.base_url);
    println!(
        "Poll every {} ms  History: {}",
        cfg.client.poll_interval.as_millis(),
        history_label(cfg)
    );
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                        Show commands");
    println!("  /exit | /quit                Exit");
    println!("  /status                      Re-check the session");
    println!("  /login <user> <password>     Sign in");
    println!("  /logout                      Sign out");
    println!("  /register <user> <password> [email]");
    println!("  /formats <url>               List formats for a URL (a bare URL works too)");
    println!("  /download <code> [--playlist]  Start a job for the last probed URL");
    println!("  /jobs                        Show tracked jobs");
    println!("  /clear <task id>             Dismiss a job");
    println!("  /topics                      List forum topics");
    println!("  /topic <id>                  Show a topic and its replies");
    println!("  /newtopic <title>            Start a topic");
    println!("  /reply <id> <text>           Reply to a topic");
    println!("  /config                      Show current config");
}

pub fn session(session: &Session) {
    match session.phase() {
        SessionPhase::Unknown => println!("session: checking..."),
        SessionPhase::Anonymous => println!("session: not logged in"),
        SessionPhase::Authenticated(user) => println!("session: logged in as {}", user.username),
    }
}

pub fn formats(url: &str, formats: &[FormatDescriptor]) {
    if formats.is_empty() {
        println!("no formats offered for {}", url);
        return;
    }
    println!("formats for {}:", url);
    for format in formats {
        let size = format
            .filesize
            .map(|bytes| format!("  ~{:.1} MiB", bytes as f64 / (1024.0 * 1024.0)))
            .unwrap_or_default();
        println!(
            "  {:<28} [{}] {}{}",
            format.code,
            format.kind.as_str(),
            format.description,
            size
        );
    }
}

pub fn job_line(job: &JobRecord) {
    let progress = match (job.status, job.progress) {
        (JobStatus::Progress, Some(pct)) => format!(" {:>3}%", pct),
        _ => String::new(),
    };
    let mut line = format!("[{}{}] {} {}", job.status.as_str(), progress, job.id, job.source_url);
    if let Some(text) = job.status_text.as_deref().filter(|_| !job.is_terminal()) {
        line.push_str(&format!(" ({})", text));
    }
    if let Some(err) = &job.error_message {
        line.push_str(&format!(" - {}", err));
    }
    println!("{}", line);
}

pub fn jobs(jobs: &[JobRecord], api_base: &str) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    for job in jobs {
        job_line(job);
        for locator in job.artifact_locators() {
            println!("    -> {}", artifact_url(api_base, &locator));
        }
    }
}

pub fn topics(topics: &[ForumTopic]) {
    if topics.is_empty() {
        println!("no topics yet");
        return;
    }
    for topic in topics {
        let author = topic
            .author
            .as_ref()
            .map(|author| author.username.as_str())
            .unwrap_or("unknown");
        println!(
            "{}  {} (by {}, {} posts)",
            topic.id,
            topic.title,
            author,
            topic.post_count.unwrap_or(0)
        );
    }
}

pub fn topic(detail: &ForumTopicDetail) {
    println!("{} ({})", detail.title, detail.created_at.format("%Y-%m-%d %H:%M"));
    if detail.posts.is_empty() {
        println!("  no replies");
    }
    for post in &detail.posts {
        let author = post
            .author
            .as_ref()
            .map(|author| author.username.as_str())
            .unwrap_or("unknown");
        println!("  {}: {}", author, post.content);
    }
}

pub fn config(cfg: &ConsoleConfig) {
    println!("config:");
    println!("  base: {}", cfg.client.base_url);
    println!("  poll: {} ms", cfg.client.poll_interval.as_millis());
    println!("  timeout: {} s", cfg.client.request_timeout.as_secs());
    println!("  poll failure limit: {}", cfg.client.effective_poll_failure_limit());
    println!("  history: {}", history_label(cfg));
    println!("  debug: {}", cfg.debug);
}

fn history_label(cfg: &ConsoleConfig) -> String {
    cfg.client
        .history_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "off".to_string())
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}

pub fn failure(err: &ClientError) {
    if err.is_retryable() {
        eprintln!("error: {} (temporary, try again)", err.display_message());
    } else {
        eprintln!("error: {}", err.display_message());
    }
}
