//! `package` and `import`.
//!
//! A builtin package is already bound at the root, so importing it only
//! matters for the dot form. A source package is compiled by a separate
//! compiler into a function that runs the package's top level in a scope of
//! its own and returns a package struct of everything it declared.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::builtins;
use crate::bytecode::{ByteCode, Declaration, FunctionScope, Opcode, Operand};
use crate::compiler::Compiler;
use crate::config::Settings;
use crate::error::{ErrorKind, Result};
use crate::lexer::TokenClass;
use crate::value::{FunctionValue, Value};

/// Source files use this extension.
pub const SOURCE_EXTENSION: &str = "tern";

impl Compiler {
    pub(super) fn package_statement(&mut self) -> Result<()> {
        self.t.next();
        let name = self.identifier()?;
        self.package = Some(name);
        Ok(())
    }

    /// `import "a"`, `import . "a"` or `import ( "a" "b" )`.
    pub(super) fn import_statement(&mut self) -> Result<()> {
        self.t.next();
        if !self.t.is_next_consume("(") {
            return self.import_spec();
        }
        loop {
            if self.t.is_next_consume(")") {
                return Ok(());
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(")")));
            }
            if self.t.is_next_consume(";") || self.t.is_next_consume(",") {
                continue;
            }
            self.import_spec()?;
        }
    }

    fn import_spec(&mut self) -> Result<()> {
        let dot = self.t.is_next_consume(".");
        let token = self.t.current().clone();
        let path = match token.class {
            TokenClass::String => token.spelling.clone(),
            TokenClass::Identifier => self.spell(&token),
            _ => return Err(self.error(ErrorKind::InvalidImport)),
        };
        let name = Path::new(&path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| self.error(ErrorKind::InvalidImport))?;
        self.t.next();

        if !self.imported.insert(name.clone()) && !dot {
            return Ok(());
        }
        if builtins::is_package(&name) {
            if dot {
                self.emit_name(Opcode::Load, &name)?;
                self.emit_op(Opcode::Explode)?;
            }
            return Ok(());
        }

        let Some(file) = self.resolve_import(&path) else {
            self.t.advance(-1);
            return Err(self.error(ErrorKind::PackageNotFound).context(&path));
        };
        let source = fs::read_to_string(&file).map_err(|err| {
            self.error(ErrorKind::PackageNotFound)
                .context(format!("{}: {}", file.display(), err))
        })?;
        debug!(target: "tern::compiler", package = %name, file = %file.display(), "import");
        let code = self.compile_package(&name, &source, file.parent())?;

        self.emit_value(Value::Function(FunctionValue::new(Arc::new(code))))?;
        self.emit_call(0, 0)?;
        if dot {
            self.emit_op(Opcode::Explode)?;
            return Ok(());
        }
        if self.is_declared_here(&name) {
            self.emit_name(Opcode::Store, &name)?;
            return Ok(());
        }
        self.create_and_store(&name)
    }

    /// Candidate files for an import path, in search order.
    fn resolve_import(&self, path: &str) -> Option<PathBuf> {
        let file = if Path::new(path).extension().is_some() {
            PathBuf::from(path)
        } else {
            PathBuf::from(format!("{}.{}", path, SOURCE_EXTENSION))
        };
        if file.is_absolute() {
            return file.is_file().then_some(file);
        }
        self.base_dir
            .iter()
            .chain(self.import_path.iter())
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }

    fn compile_package(&self, name: &str, source: &str, dir: Option<&Path>) -> Result<ByteCode> {
        let settings = Settings {
            strictness: self.strictness,
            normalize: self.normalize,
            import_path: self.import_path.clone(),
            ..Settings::default()
        };
        let mut sub = Compiler::new(name, &settings);
        sub.base_dir = dir.map(Path::to_path_buf);
        sub.compile_statements(source)?;
        let package = sub.package.get_or_insert_with(|| name.to_string()).clone();

        let mut seen = HashSet::new();
        let exports: Vec<String> = sub
            .exports
            .iter()
            .filter(|export| seen.insert((*export).clone()))
            .cloned()
            .collect();
        for export in &exports {
            sub.emit_value(Value::String(export.clone()))?;
            sub.emit_name(Opcode::Load, export)?;
        }
        sub.emit(
            Opcode::Struct,
            Operand::Tuple(vec![
                Operand::Int(exports.len() as i64),
                Operand::Name(package.clone()),
            ]),
        )?;
        sub.emit(Opcode::Return, Operand::Int(1))?;

        let mut code = sub.finish()?;
        code.name = format!("package {}", package);
        code.declaration = Some(Declaration {
            name: package,
            scope: FunctionScope::Caller,
            ..Declaration::default()
        });
        Ok(code)
    }
}
