//! The query engine: session → history → LLM ⇄ tools → answer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::config::{LecternConfig, RagConfig};
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::{GenerateParams, Provider, VectorIndex};
use lectern_core::types::{IndexStats, Message, ProviderResponse, SearchFilter, SessionMessage};
use lectern_knowledge::ingest::IngestOptions;
use lectern_knowledge::{Chunker, IngestionSummary, Ingestor, RawDocument, SqliteVectorStore};
use lectern_memory::SessionStore;
use lectern_tools::{SourceLedger, ToolInvocation, ToolManager, course_search, course_tools};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::prompt::{SYSTEM_PROMPT, context_message, history_message};

/// Answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub session_id: String,
}

const NO_ANSWER: &str = "I'm not sure how to respond.";

pub struct QueryEngine {
    rag: RagConfig,
    params: GenerateParams,
    provider: Box<dyn Provider>,
    index: Arc<dyn VectorIndex>,
    tools: ToolManager,
    sessions: SessionStore,
    ingestor: Ingestor,
    query_timeout: Option<Duration>,
}

impl QueryEngine {
    /// Assemble an engine from parts. Rejects bad chunking parameters up front.
    pub fn new(
        rag: RagConfig,
        params: GenerateParams,
        provider: Box<dyn Provider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let chunker = Chunker::new(rag.chunk_size, rag.chunk_overlap)?;
        let query_timeout = (rag.query_timeout_secs > 0)
            .then(|| Duration::from_secs(rag.query_timeout_secs));
        Ok(Self {
            tools: course_tools(index.clone(), rag.max_search_results),
            sessions: SessionStore::new(rag.max_retained_messages),
            ingestor: Ingestor::new(index.clone(), chunker),
            rag,
            params,
            provider,
            index,
            query_timeout,
        })
    }

    /// Build everything from config: provider, embedder and the on-disk index.
    pub fn from_config(config: &LecternConfig) -> Result<Self> {
        config.validate()?;
        let provider = lectern_providers::create_provider(&config.llm)?;
        let embedder =
            lectern_providers::create_embedder(&config.embedding, config.llm.max_attempts)?;
        let index = SqliteVectorStore::open(&config.store.resolved_path(), embedder)?;
        let params = GenerateParams {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        };
        Self::new(config.rag.clone(), params, provider, Arc::new(index))
    }

    /// Override the per-query deadline. `None` disables it.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Answer `question` within the session, creating one if needed.
    pub async fn submit_query(&self, question: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        if question.trim().is_empty() {
            return Err(LecternError::InvalidArgument("query cannot be empty".into()));
        }
        let deadline = self.query_timeout.map(|t| Instant::now() + t);

        let session_id = self.sessions.get_or_create(session_id)?;
        let mut ledger = SourceLedger::new();
        let history = self
            .sessions
            .recent_history(&session_id, self.rag.max_history_turns * 2)?;

        let mut messages = self.compose(&history, question, &mut ledger).await;
        let answer = self.run_loop(&mut messages, &mut ledger, deadline).await?;

        let sources = ledger.last_sources();
        self.sessions
            .append_exchange(&session_id, question, &answer, sources.clone())?;
        tracing::info!("💬 Answered in session {} ({} sources)", session_id, sources.len());

        Ok(QueryResponse {
            answer,
            sources,
            session_id,
        })
    }

    async fn compose(
        &self,
        history: &[SessionMessage],
        question: &str,
        ledger: &mut SourceLedger,
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.extend(history_message(history));
        if self.rag.prefetch_context {
            messages.extend(self.prefetch(question, ledger).await);
        }
        messages.push(Message::user(question));
        messages
    }

    /// Retrieve excerpts up front. Failures only cost the extra context.
    async fn prefetch(&self, question: &str, ledger: &mut SourceLedger) -> Option<Message> {
        let filter = SearchFilter::default();
        match self.index.query(question, self.rag.max_search_results, &filter).await {
            Ok(results) if !results.is_empty() => {
                let output = course_search::format_results(&results, &filter);
                ledger.record("prefetch", output.sources);
                Some(context_message(&output.text))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("⚠️ Context prefetch failed: {e}");
                None
            }
        }
    }

    async fn call_llm(
        &self,
        messages: &[Message],
        with_tools: bool,
        deadline: Option<Instant>,
    ) -> Result<ProviderResponse> {
        let defs = if with_tools { self.tools.definitions() } else { Vec::new() };
        let call = self.provider.chat(messages, &defs, &self.params);
        match deadline {
            Some(at) => tokio::time::timeout_at(at, call)
                .await
                .map_err(|_| self.timed_out())?,
            None => call.await,
        }
    }

    fn timed_out(&self) -> LecternError {
        LecternError::Timeout(self.query_timeout.map(|t| t.as_secs()).unwrap_or(0))
    }

    fn past(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// At most `cap` tool rounds; the call after the last round offers no
    /// tools, so the LLM is invoked at most `cap + 1` times.
    async fn run_loop(
        &self,
        messages: &mut Vec<Message>,
        ledger: &mut SourceLedger,
        deadline: Option<Instant>,
    ) -> Result<String> {
        let cap = self.rag.tool_call_iteration_cap;
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for round in 0..=cap {
            let response = self.call_llm(messages, round < cap, deadline).await?;
            let content = response.content.filter(|c| !c.trim().is_empty());

            if response.tool_calls.is_empty() {
                return Ok(content.unwrap_or_else(|| NO_ANSWER.into()));
            }
            if round == cap {
                tracing::warn!("⚠️ Tool-call cap ({cap}) reached, stopping");
                return Ok(content.unwrap_or_else(|| fallback(invocations.last())));
            }

            tracing::info!(
                "Tool round {}/{}: {} tool call(s)",
                round + 1,
                cap,
                response.tool_calls.len()
            );
            messages.push(Message::assistant_tool_calls(
                content.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for tc in &response.tool_calls {
                if Self::past(deadline) {
                    return Err(self.timed_out());
                }
                tracing::info!(
                    "  → {} ({})",
                    tc.function.name,
                    tc.function.arguments.chars().take(100).collect::<String>()
                );
                let (arguments, output) = self
                    .tools
                    .execute_json(&tc.function.name, &tc.function.arguments)
                    .await;
                // A result that lands after the deadline is discarded.
                if Self::past(deadline) {
                    return Err(self.timed_out());
                }
                ledger.record(&tc.function.name, output.sources);
                messages.push(Message::tool(&output.text, &tc.id));
                invocations.push(ToolInvocation {
                    tool_name: tc.function.name.clone(),
                    arguments,
                    result_text: output.text,
                });
            }
        }

        Ok(fallback(invocations.last()))
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    pub async fn course_titles(&self) -> Result<Vec<String>> {
        self.index.source_titles().await
    }

    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        self.sessions.clear(session_id)
    }

    pub async fn ingest_documents(
        &self,
        docs: &[RawDocument],
        opts: IngestOptions,
    ) -> Result<IngestionSummary> {
        self.ingestor.ingest_documents(docs, opts).await
    }

    pub async fn ingest_folder(&self, dir: &Path, opts: IngestOptions) -> Result<IngestionSummary> {
        self.ingestor.ingest_folder(dir, opts).await
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }
}

fn fallback(last: Option<&ToolInvocation>) -> String {
    match last {
        Some(inv) => format!(
            "I couldn't complete an answer within the tool-call limit. Last result from {}:\n{}",
            inv.tool_name, inv.result_text
        ),
        None => NO_ANSWER.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lectern_core::types::{Role, ToolCall, ToolDefinition};
    use lectern_providers::HashingEmbedder;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const COURSE: &str = "Course Title: Intro to MCP
Course Link: https://example.com/mcp

Lesson 1: Getting started
This intro explains what the Model Context Protocol is.
";

    /// Plays back scripted responses; once exhausted, keeps asking for a search.
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<ProviderResponse>>,
        seen: Arc<Mutex<Vec<(Vec<Message>, usize)>>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ProviderResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn chat(
            &self,
            messages: &[Message],
            tools: &[ToolDefinition],
            _: &GenerateParams,
        ) -> Result<ProviderResponse> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let call_no = {
                let mut seen = self.seen.lock().unwrap();
                seen.push((messages.to_vec(), tools.len()));
                seen.len()
            };
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| {
                ProviderResponse::tool_calls(vec![search_call(&format!("c{call_no}"), "intro")])
            }))
        }
    }

    fn search_call(id: &str, query: &str) -> ToolCall {
        ToolCall::new(
            id,
            "search_course_content",
            serde_json::json!({ "query": query }).to_string(),
        )
    }

    fn rag() -> RagConfig {
        RagConfig::default()
    }

    async fn engine_with(provider: ScriptedProvider, rag: RagConfig) -> QueryEngine {
        let index = SqliteVectorStore::open_in_memory(Arc::new(HashingEmbedder::new(64).unwrap())).unwrap();
        let engine = QueryEngine::new(rag, GenerateParams::default(), Box::new(provider), Arc::new(index)).unwrap();
        let docs = [RawDocument { name: "mcp".into(), text: COURSE.into() }];
        engine.ingest_documents(&docs, IngestOptions::default()).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_full_loop_single_source() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::tool_calls(vec![search_call("c1", "intro")]),
            ProviderResponse::text("MCP standardises how models reach tools."),
        ]);
        let seen = provider.seen.clone();
        let engine = engine_with(provider, rag()).await;

        let resp = engine.submit_query("What is MCP?", None).await.unwrap();
        assert_eq!(resp.answer, "MCP standardises how models reach tools.");
        assert_eq!(resp.sources, vec!["Intro to MCP - Lesson 1"]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let second = &seen[1].0;
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert!(tool_msg.content.starts_with("[Intro to MCP - Lesson 1]\n"));
    }

    #[tokio::test]
    async fn test_iteration_cap_bounds_llm_calls() {
        let provider = ScriptedProvider::default();
        let seen = provider.seen.clone();
        let engine = engine_with(provider, rag()).await;

        let resp = engine.submit_query("loop forever", None).await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        // The last call offers no tools.
        assert!(seen[..3].iter().all(|(_, n)| *n == 2));
        assert_eq!(seen[3].1, 0);
        assert!(resp.answer.contains("tool-call limit"));
        assert!(resp.answer.contains("[Intro to MCP - Lesson 1]"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fed_back() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::tool_calls(vec![ToolCall::new("x1", "delete_everything", "{}")]),
            ProviderResponse::text("Sorry, I can't do that."),
        ]);
        let seen = provider.seen.clone();
        let engine = engine_with(provider, rag()).await;

        let resp = engine.submit_query("drop the tables", None).await.unwrap();
        assert_eq!(resp.answer, "Sorry, I can't do that.");
        assert!(resp.sources.is_empty());
        let seen = seen.lock().unwrap();
        let tool_msg = seen[1].0.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.starts_with("Tool 'delete_everything' not found. Available tools:"));
    }

    #[tokio::test]
    async fn test_multiple_calls_run_in_order() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::tool_calls(vec![
                ToolCall::new("o1", "get_course_outline", r#"{"course_title": "MCP"}"#),
                search_call("s1", "intro"),
            ]),
            ProviderResponse::text("done"),
        ]);
        let seen = provider.seen.clone();
        let engine = engine_with(provider, rag()).await;

        let resp = engine.submit_query("outline and intro", None).await.unwrap();
        assert_eq!(resp.sources, vec!["Intro to MCP", "Intro to MCP - Lesson 1"]);
        let seen = seen.lock().unwrap();
        let ids: Vec<_> = seen[1]
            .0
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["o1", "s1"]);
    }

    #[tokio::test]
    async fn test_empty_follow_up_search_clears_sources() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::tool_calls(vec![search_call("s1", "intro")]),
            ProviderResponse::tool_calls(vec![ToolCall::new(
                "s2",
                "search_course_content",
                r#"{"query": "intro", "course_name": "Quantum Basket Weaving"}"#,
            )]),
            ProviderResponse::text("nothing relevant"),
        ]);
        let engine = engine_with(provider, rag()).await;
        let resp = engine.submit_query("q", None).await.unwrap();
        assert!(resp.sources.is_empty());
    }

    #[tokio::test]
    async fn test_history_recorded_and_replayed() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::text("first answer"),
            ProviderResponse::text("second answer"),
        ]);
        let seen = provider.seen.clone();
        let engine = engine_with(provider, rag()).await;

        let first = engine.submit_query("first question", None).await.unwrap();
        let second = engine
            .submit_query("second question", Some(&first.session_id))
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let history = engine.sessions().recent_history(&first.session_id, 10).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].content, "second answer");

        let seen = seen.lock().unwrap();
        let replay = &seen[1].0[1];
        assert_eq!(replay.role, Role::System);
        assert!(replay.content.contains("User: first question\nAssistant: first answer"));
    }

    #[tokio::test]
    async fn test_history_window_is_bounded() {
        let provider = ScriptedProvider::new((0..4).map(|i| ProviderResponse::text(format!("a{i}"))).collect());
        let seen = provider.seen.clone();
        let rag = RagConfig { max_history_turns: 1, ..rag() };
        let engine = engine_with(provider, rag).await;

        let id = engine.submit_query("q0", None).await.unwrap().session_id;
        for i in 1..4 {
            engine.submit_query(&format!("q{i}"), Some(&id)).await.unwrap();
        }
        let seen = seen.lock().unwrap();
        let last_history = &seen[3].0[1].content;
        assert!(last_history.contains("q2"));
        assert!(!last_history.contains("q1"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let provider = ScriptedProvider {
            delay: Some(Duration::from_millis(500)),
            ..ScriptedProvider::default()
        };
        let engine = engine_with(provider, rag())
            .await
            .with_query_timeout(Some(Duration::from_millis(20)));
        let err = engine.submit_query("slow", None).await.unwrap_err();
        assert!(matches!(err, LecternError::Timeout(_)));
        assert_eq!(engine.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_question_rejected_before_side_effects() {
        let engine = engine_with(ScriptedProvider::default(), rag()).await;
        let err = engine.submit_query("   ", None).await.unwrap_err();
        assert!(matches!(err, LecternError::InvalidArgument(_)));
        assert!(engine.sessions().is_empty());
    }

    #[test]
    fn test_bad_chunking_config_is_invalid_argument() {
        let mut config = LecternConfig::default();
        config.rag.chunk_overlap = config.rag.chunk_size + 1;
        let err = QueryEngine::from_config(&config).err().unwrap();
        assert!(matches!(err, LecternError::InvalidArgument(_)));

        let rag = RagConfig {
            chunk_overlap: 800,
            ..RagConfig::default()
        };
        let err = QueryEngine::new(
            rag,
            GenerateParams::default(),
            Box::new(ScriptedProvider::new(vec![])),
            Arc::new(SqliteVectorStore::open_in_memory(Arc::new(HashingEmbedder::new(8).unwrap())).unwrap()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, LecternError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_prefetch_adds_context_and_sources() {
        let provider = ScriptedProvider::new(vec![ProviderResponse::text("answer")]);
        let seen = provider.seen.clone();
        let rag = RagConfig { prefetch_context: true, ..rag() };
        let engine = engine_with(provider, rag).await;

        let resp = engine.submit_query("intro", None).await.unwrap();
        assert_eq!(resp.sources, vec!["Intro to MCP - Lesson 1"]);
        let seen = seen.lock().unwrap();
        assert!(seen[0].0.iter().any(|m| m.content.starts_with("[Course context]")));
    }

    #[tokio::test]
    async fn test_clear_session_and_stats() {
        let engine = engine_with(ScriptedProvider::new(vec![ProviderResponse::text("a")]), rag()).await;
        let id = engine.submit_query("q", None).await.unwrap().session_id;
        engine.clear_session(&id).unwrap();
        assert!(engine.sessions().recent_history(&id, 2).unwrap().is_empty());
        assert!(matches!(engine.clear_session("nope"), Err(LecternError::UnknownSession(_))));

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.total_sources, 1);
        assert_eq!(engine.course_titles().await.unwrap(), vec!["Intro to MCP"]);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_engine() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider::new((0..8).map(|_| ProviderResponse::text("ok")).collect());
        let engine = Arc::new(engine_with(provider, rag()).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                engine.submit_query(&format!("q{i}"), None).await.unwrap();
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(engine.sessions().len(), 8);
    }
}
