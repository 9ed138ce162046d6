//! Built-in feature modules
//!
//! Registered by [`register_builtins`] in a fixed order.

pub mod ai_assistant;
pub mod build;
pub mod debugger;
pub mod editor;
pub mod file_browser;
pub mod git;
pub mod lsp;
pub mod terminal;
pub mod ui_theme;

pub use ai_assistant::AiAssistantModule;
pub use build::BuildModule;
pub use debugger::DebuggerModule;
pub use editor::EditorModule;
pub use file_browser::FileBrowserModule;
pub use git::GitModule;
pub use lsp::LspModule;
pub use terminal::TerminalModule;
pub use ui_theme::{ThemeMode, UiThemeModule};

use crate::domain::{Registry, SettingsModule};
use std::sync::Arc;

/// Built-in module ids in registration order
pub const BUILTIN_MODULE_IDS: [&str; 9] = [
    ui_theme::MODULE_ID,
    editor::MODULE_ID,
    terminal::MODULE_ID,
    git::MODULE_ID,
    build::MODULE_ID,
    debugger::MODULE_ID,
    lsp::MODULE_ID,
    file_browser::MODULE_ID,
    ai_assistant::MODULE_ID,
];

/// Register every built-in module whose id is not taken yet
pub fn register_builtins(registry: &Registry) {
    fn add<T: SettingsModule>(registry: &Registry, module: T) {
        if registry.contains_module(module.id()) {
            tracing::debug!(module = %module.id(), "Keeping host-registered module");
            return;
        }
        if let Err(e) = registry.register_module(Arc::new(module)) {
            tracing::error!(error = %e, "Failed to register built-in module");
        }
    }

    add(registry, UiThemeModule::new());
    add(registry, EditorModule::new());
    add(registry, TerminalModule::new());
    add(registry, GitModule::new());
    add(registry, BuildModule::new());
    add(registry, DebuggerModule::new());
    add(registry, LspModule::new());
    add(registry, FileBrowserModule::new());
    add(registry, AiAssistantModule::new());
}
