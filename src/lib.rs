/*!
 * # locflow - localization workflow engine
 *
 * A Rust library that drives content through a human and machine
 * translation workflow.
 *
 * ## Features
 *
 * - Translation requests with a strict status state machine and an
 *   append-only event log
 * - Leverage of prior work: translation memory (exact and fuzzy matches),
 *   glossary enforcement and machine translation fallback
 * - Automatic translator assignment under workload limits
 * - Multi-assessor quality scoring
 * - Workflow analytics over a date range
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `workflow`: Request model, events and the transition table
 * - `service`: The inbound operations of the engine
 * - `leverage`: Draft resolution from TM, glossary and MT
 * - `memory`: Translation memory store
 * - `glossary`: Terminology store
 * - `providers`: Machine translation clients:
 *   - `providers::mock`: Deterministic offline provider
 *   - `providers::ollama`: Ollama API client
 * - `scheduler`: Translator selection policies and auto-assignment
 * - `quality`: Assessments and heuristic quality estimates
 * - `analytics`: Reporting over requests and events
 * - `collaborators`: Content source, translator directory and publisher
 * - `database`: SQLite persistence
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod analytics;
pub mod app_config;
pub mod collaborators;
pub mod database;
pub mod errors;
pub mod glossary;
pub mod language_utils;
pub mod leverage;
pub mod memory;
pub mod providers;
pub mod quality;
pub mod scheduler;
pub mod service;
pub mod similarity;
pub mod workflow;

// Re-export main types for easier usage
pub use analytics::{AnalyticsReport, DateRange};
pub use app_config::Config;
pub use errors::{DirectoryError, ProviderError, WorkflowError, WorkflowResult};
pub use language_utils::{get_language_name, language_codes_match, normalize_language_code};
pub use leverage::{LeverageMethod, LeverageProposal, LeverageRequest, LeverageResolver};
pub use service::{Collaborators, RequestOptions, ReviewDecision, WorkflowService};
pub use workflow::{Actor, RequestStatus, TranslationRequest, WorkflowEvent};
