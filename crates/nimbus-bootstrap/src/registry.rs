//! Registries that receive delegated crash reporters and dashboard panels.

use serde::Serialize;
use tracing::debug;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;

/// Crash reporter classes, instantiated on first report.
#[derive(Debug, Default)]
pub struct CrashReporterRegistry {
    reporters: Vec<String>,
}

impl CrashReporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_lazy(&mut self, class: &str) -> AppResult<()> {
        if self.reporters.iter().any(|r| r == class) {
            return Err(AppError::conflict(format!(
                "Crash reporter {class} is already registered"
            )));
        }
        debug!(reporter = %class, "Crash reporter registered");
        self.reporters.push(class.to_string());
        Ok(())
    }

    pub fn reporters(&self) -> &[String] {
        &self.reporters
    }
}

/// A dashboard panel and the app that provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardWidget {
    pub app_id: String,
    pub class: String,
}

#[derive(Debug, Default)]
pub struct DashboardManager {
    widgets: Vec<DashboardWidget>,
}

impl DashboardManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy_register_widget(&mut self, class: &str, app_id: &str) -> AppResult<()> {
        if self.widgets.iter().any(|w| w.class == class) {
            return Err(AppError::conflict(format!(
                "Dashboard widget {class} is already registered"
            )));
        }
        self.widgets.push(DashboardWidget {
            app_id: app_id.to_string(),
            class: class.to_string(),
        });
        Ok(())
    }

    pub fn widgets(&self) -> &[DashboardWidget] {
        &self.widgets
    }

    pub fn widgets_of(&self, app_id: &str) -> impl Iterator<Item = &DashboardWidget> {
        self.widgets.iter().filter(move |w| w.app_id == app_id)
    }
}
