//! Expression binding
//!
//! Compiles the `func` template of a section into its own environment, with
//! the section's scripting primitives registered. Nothing is cached between
//! renders: every call evaluates the template from scratch against the
//! current variable values.

use std::sync::Arc;

use common::ShutdownSink;
use minijinja::{context, Environment};
use tracing::{debug, trace};

use crate::error::{ConfigError, EvalError, Result};
use crate::store::VariableStore;
use crate::surface::{eval_error_of, ScriptingSurface};

/// Option holding the template source
pub const FUNC_OPTION: &str = "func";

/// A compiled predictive template
pub struct ExpressionBinding {
    section: String,
    template_name: String,
    source: String,
    surface: Arc<ScriptingSurface>,
    env: Environment<'static>,
}

impl ExpressionBinding {
    /// Compile `source` with the primitives of `surface` registered
    pub fn bind(
        section: impl Into<String>,
        source: impl Into<String>,
        surface: Arc<ScriptingSurface>,
    ) -> std::result::Result<Self, ConfigError> {
        let section = section.into();
        let source = source.into();
        let template_name = format!("{}:{}", section, FUNC_OPTION);

        let mut env = Environment::new();
        surface.register(&mut env);
        env.add_template_owned(template_name.clone(), source.clone())
            .map_err(|e| ConfigError::template(&section, FUNC_OPTION, e.to_string()))?;

        debug!("Bound template {}", template_name);
        Ok(Self {
            section,
            template_name,
            source,
            surface,
            env,
        })
    }

    /// Build the store, surface and binding of a section from its raw options
    ///
    /// All `variable_<name>` options are declared before the template is
    /// compiled; `func` is required.
    pub fn from_options<'a, I>(
        section: &str,
        options: I,
        shutdown: Arc<dyn ShutdownSink>,
    ) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        I::IntoIter: Clone,
    {
        let options = options.into_iter();
        let store = VariableStore::from_options(section, options.clone())?;
        let source = options
            .clone()
            .find(|(option, _)| *option == FUNC_OPTION)
            .map(|(_, text)| text)
            .ok_or_else(|| ConfigError::missing_option(section, FUNC_OPTION))?;

        let surface = ScriptingSurface::new(store.into_shared(), shutdown);
        Self::bind(section, source, surface)
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn surface(&self) -> &Arc<ScriptingSurface> {
        &self.surface
    }

    /// Source text of the template
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the template and return the rendered text
    pub fn render(&self) -> Result<String> {
        let template = self
            .env
            .get_template(&self.template_name)
            .map_err(|e| EvalError::render(e.to_string()))?;
        let text = template
            .render(context! {})
            .map_err(|e| eval_error_of(&e).unwrap_or_else(|| EvalError::render(e.to_string())))?;
        trace!("{} rendered '{}'", self.template_name, text);
        Ok(text)
    }

    /// Render and parse the result as a number
    pub fn evaluate(&self) -> Result<f64> {
        parse_predicted(&self.render()?)
    }
}

impl std::fmt::Debug for ExpressionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionBinding")
            .field("template", &self.template_name)
            .field("surface", &self.surface)
            .finish()
    }
}

/// Parse rendered template text as a predicted value
pub fn parse_predicted(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| EvalError::NonNumericResult {
            text: text.to_string(),
        })
}
