use std::collections::HashMap;

use downloader_client_rs::{JobRecord, JobStatus, SessionPhase, TrackerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::client::Services;
use crate::models::ConsoleConfig;
use crate::render;

pub struct Repl {
    pub config: ConsoleConfig,
    pub services: Services,
    last_url: Option<String>,
    seen: HashMap<String, (JobStatus, Option<u8>)>,
    last_phase: Option<SessionPhase>,
}

impl Repl {
    pub fn new(config: ConsoleConfig, services: Services) -> Self {
        Self {
            config,
            services,
            last_url: None,
            seen: HashMap::new(),
            last_phase: None,
        }
    }

    pub async fn run(&mut self) {
        render::banner(&self.config);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut events = self.services.tracker.subscribe();
        let mut session_rx = self.services.session.subscribe();
        let jobs = self.services.tracker.jobs();
        self.report_changes(&jobs);
        render::prompt();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) | Err(_) => break,
                    };
                    let line = line.trim();
                    if !line.is_empty() && self.handle_line(line).await {
                        break;
                    }
                    render::prompt();
                }
                event = events.recv() => match event {
                    Ok(TrackerEvent::JobsChanged(jobs)) => self.report_changes(&jobs),
                    Ok(TrackerEvent::PollerStarted) => debug!("status polling started"),
                    Ok(TrackerEvent::PollerStopped) => debug!("status polling stopped"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "console fell behind job updates");
                        let jobs = self.services.tracker.jobs();
                        self.report_changes(&jobs);
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = session_rx.borrow().clone();
                    if self.last_phase.as_ref() != Some(session.phase()) {
                        self.last_phase = Some(session.phase().clone());
                        render::session(&session);
                    }
                }
            }
        }

        self.services.tracker.shutdown();
    }

    async fn handle_line(&mut self, line: &str) -> bool {
        if !line.starts_with('/') {
            self.probe(line).await;
            return false;
        }
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        let args: Vec<&str> = rest.split_whitespace().collect();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "config" => render::config(&self.config),
            "status" => match self.services.session.refresh_status().await {
                Ok(session) => render::session(&session),
                Err(err) => render::failure(&err),
            },
            "login" => match args.as_slice() {
                [username, password] => match self.services.session.login(username, password).await {
                    Ok(user) => render::info(&format!("welcome, {}", user.username)),
                    Err(err) => render::failure(&err),
                },
                _ => render::error("usage: /login <user> <password>"),
            },
            "logout" => {
                if let Err(err) = self.services.session.logout().await {
                    render::error(&format!(
                        "server logout failed ({}); signed out locally",
                        err.display_message()
                    ));
                }
            }
            "register" => match args.as_slice() {
                [username, password] | [username, password, _] => {
                    let email = args.get(2).copied();
                    match self
                        .services
                        .session
                        .register(username, password, email)
                        .await
                    {
                        Ok(message) => render::info(&message),
                        Err(err) => render::failure(&err),
                    }
                }
                _ => render::error("usage: /register <user> <password> [email]"),
            },
            "formats" => {
                if rest.is_empty() {
                    render::error("usage: /formats <url>");
                } else {
                    self.probe(rest).await;
                }
            }
            "download" => self.download(&args).await,
            "jobs" => render::jobs(&self.services.tracker.jobs(), self.services.backend.base_url()),
            "clear" => match args.first() {
                Some(id) => {
                    if !self.services.tracker.remove(id) {
                        render::info("no such job");
                    }
                }
                None => render::error("usage: /clear <task id>"),
            },
            "topics" => match self.services.forum.list_topics().await {
                Ok(topics) => render::topics(&topics),
                Err(err) => render::failure(&err),
            },
            "topic" => match self.services.forum.topic(rest).await {
                Ok(detail) => render::topic(&detail),
                Err(err) => render::failure(&err),
            },
            "newtopic" => match self.services.forum.create_topic(rest).await {
                Ok(topic) => render::info(&format!("created topic {}", topic.id)),
                Err(err) => render::failure(&err),
            },
            "reply" => {
                let mut split = rest.splitn(2, ' ');
                let topic_id = split.next().unwrap_or("");
                let content = split.next().unwrap_or("");
                match self.services.forum.reply(topic_id, content).await {
                    Ok(_) => render::info("reply posted"),
                    Err(err) => render::failure(&err),
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    async fn probe(&mut self, url: &str) {
        match self.services.tracker.probe_formats(url).await {
            Ok(formats) => {
                self.last_url = Some(url.trim().to_string());
                render::formats(url.trim(), &formats);
            }
            Err(err) => render::failure(&err),
        }
    }

    async fn download(&mut self, args: &[&str]) {
        let url = match &self.last_url {
            Some(url) => url.clone(),
            None => {
                render::error("probe a URL with /formats first");
                return;
            }
        };
        let is_playlist = args.contains(&"--playlist");
        let code = match args.iter().find(|arg| !arg.starts_with("--")) {
            Some(code) => *code,
            None => {
                render::error("usage: /download <code> [--playlist]");
                return;
            }
        };
        let kind = self.services.tracker.resolve_format_kind(code);
        match self
            .services
            .tracker
            .submit(&url, code, kind, is_playlist)
            .await
        {
            Ok(task_id) => render::info(&format!("started job {}", task_id)),
            Err(err) => render::failure(&err),
        }
    }

    fn report_changes(&mut self, jobs: &[JobRecord]) {
        let mut next = HashMap::with_capacity(jobs.len());
        for job in jobs {
            let key = (job.status, job.progress);
            if self.seen.get(&job.id) != Some(&key) {
                render::job_line(job);
                for locator in job.artifact_locators() {
                    render::info(&format!(
                        "    -> {}",
                        downloader_client_rs::task::artifact_url(
                            self.services.backend.base_url(),
                            &locator
                        )
                    ));
                }
            }
            next.insert(job.id.clone(), key);
        }
        self.seen = next;
    }
}
