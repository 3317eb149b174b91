/*!
 * Main test entry point for the locflow test suite
 */

#![allow(non_snake_case)]

// Import common test utilities
pub mod common;

// Import unit tests
mod unit {
    // Language utilities tests
    pub mod language_utils_tests;

    // App configuration tests
    pub mod app_config_tests;

    // JSON-backed collaborators
    pub mod collaborators_tests;
}

// Import integration tests
mod integration {
    // Request lifecycle from creation to publication
    pub mod workflow_lifecycle_tests;

    // TM, glossary and machine translation through the service
    pub mod leverage_tests;

    // Automatic and manual assignment
    pub mod assignment_tests;

    // Reporting
    pub mod analytics_tests;

    // On-disk persistence across service restarts
    pub mod persistence_tests;
}
