/// Inkpot rewriter
///
/// Makes blocking-looking calls to the input primitive cooperate with the
/// suspend-capable interpreter by wrapping each one in `await`.

pub mod codegen;
pub mod error;
pub mod transform;

pub use codegen::SourceGenerator;
pub use error::{Result, RewriteError};
pub use transform::AwaitInserter;

use inkpot_parser::{Module, fix_missing_locations, missing_locations, parse};
use tracing::{debug, warn};

/// Name of the input primitive unless configured otherwise.
pub const DEFAULT_PRIMITIVE: &str = "input";

/// Rewrite `source` with the default primitive, falling back to the
/// original text on any failure.
pub fn rewrite(source: &str) -> String {
    Rewriter::new().rewrite(source)
}

#[derive(Debug, Clone)]
pub struct Rewriter {
    primitive: String,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Rewriter {
    pub fn new() -> Self {
        Self {
            primitive: DEFAULT_PRIMITIVE.to_string(),
        }
    }

    /// Set the name of the function whose calls get suspended.
    pub fn primitive(mut self, name: impl Into<String>) -> Self {
        self.primitive = name.into();
        self
    }

    pub fn primitive_name(&self) -> &str {
        &self.primitive
    }

    /// Rewrite, returning the source unchanged if it cannot be transformed.
    pub fn rewrite(&self, source: &str) -> String {
        fail_open(source, self.try_rewrite(source))
    }

    pub fn try_rewrite(&self, source: &str) -> Result<String> {
        let module = self.transform(source)?;
        SourceGenerator::new().generate(&module)
    }

    /// Number of calls `rewrite` would wrap.
    pub fn pending(&self, source: &str) -> Result<usize> {
        let mut module = parse(source)?;
        Ok(AwaitInserter::run(&self.primitive, &mut module))
    }

    /// Parse and transform, returning the repaired tree.
    pub fn transform(&self, source: &str) -> Result<Module> {
        let mut module = parse(source)?;
        let wrapped = AwaitInserter::run(&self.primitive, &mut module);
        debug!(primitive = %self.primitive, wrapped, "inserted suspension points");

        fix_missing_locations(&mut module);
        check_locations(&module)?;
        Ok(module)
    }
}

/// Fail unless every node in `module` has a complete location.
pub fn check_locations(module: &Module) -> Result<()> {
    match missing_locations(module).first() {
        Some(id) => Err(RewriteError::Transform(format!(
            "node {} has no source location after repair",
            id.0
        ))),
        None => Ok(()),
    }
}

fn fail_open(source: &str, result: Result<String>) -> String {
    match result {
        Ok(rewritten) => rewritten,
        Err(e) => {
            warn!("rewrite failed, running source unchanged: {}", e);
            source.to_string()
        }
    }
}
