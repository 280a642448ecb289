#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use database_operate::db::{Database, SqliteStore};
use database_operate::error::{RenderError, SessionError};
use database_operate::models::CommandSettings;
use database_operate::render::{RenderedImage, Renderer};
use database_operate::{AppState, Dispatcher, FieldMap, Reply, Session};

/// Keeps every rendered page in memory
#[derive(Default)]
pub struct RecordingRenderer {
    pages: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn pages(&self) -> Vec<String> {
        self.pages.lock().unwrap().clone()
    }

    pub fn last_page(&self) -> String {
        self.pages().last().cloned().expect("nothing rendered")
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, html: &str) -> Result<RenderedImage, RenderError> {
        let mut pages = self.pages.lock().unwrap();
        pages.push(html.to_string());

        Ok(RenderedImage {
            path: PathBuf::from(format!("page-{}.html", pages.len())),
            content_type: "text/html".to_string(),
        })
    }
}

/// Answers prompts from a fixed script and records what was sent
#[derive(Default)]
pub struct ScriptedSession {
    pub answers: VecDeque<Option<String>>,
    pub sent: Vec<Reply>,
    pub prompts: Vec<Duration>,
}

impl ScriptedSession {
    pub fn answering(answer: Option<&str>) -> Self {
        ScriptedSession {
            answers: VecDeque::from([answer.map(String::from)]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn send(&mut self, reply: Reply) -> Result<(), SessionError> {
        self.sent.push(reply);
        Ok(())
    }

    async fn prompt(&mut self, timeout: Duration) -> Result<Option<String>, SessionError> {
        self.prompts.push(timeout);
        Ok(self.answers.pop_front().flatten())
    }
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub renderer: Arc<RecordingRenderer>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE user (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL DEFAULT '',
                    age INTEGER DEFAULT 0,
                    authority INTEGER DEFAULT 1
                );
                CREATE TABLE channel (id TEXT PRIMARY KEY, platform TEXT);
                INSERT INTO user (name, age) VALUES
                    ('koishi', 18),
                    ('satori', 17),
                    ('nonebot', 18),
                    ('<b>mallory</b>', 99);
                "#,
            )
            .unwrap();

        let store = Arc::new(store);
        let renderer = Arc::new(RecordingRenderer::default());
        let state = AppState::new(store.clone(), renderer.clone(), CommandSettings::default());

        Harness {
            store,
            renderer,
            dispatcher: Dispatcher::new(state),
        }
    }

    pub async fn run(&self, line: &str) -> Reply {
        let mut session = ScriptedSession::default();
        self.run_with(line, &mut session).await
    }

    pub async fn run_with(&self, line: &str, session: &mut ScriptedSession) -> Reply {
        self.dispatcher
            .handle(line, session)
            .await
            .unwrap()
            .expect("line was not handled")
    }

    pub async fn count(&self, pairs: &[(&str, &str)]) -> usize {
        let query: FieldMap = pairs.iter().copied().collect();
        self.store.get("user", &query).await.unwrap().len()
    }
}

pub fn text(reply: &Reply) -> &str {
    reply.text().expect("expected a text reply")
}
