//! Module, Global Variables and Aliases
//!
//! Defines the top-level module structure and the symbol-level queries and
//! rewrites the linker performs on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::{Function, Instruction, IrType, Value};

/// Linkage types for global symbols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    External,  // Visible to other modules
    Internal,  // Only visible within this module (static)
    Private,   // Not even in the symbol table
    Weak,      // May be replaced by a strong definition
    LinkOnce,  // Weak, and dropped if unreferenced
}

impl Linkage {
    /// Symbol is not visible to other modules
    pub fn is_local(&self) -> bool {
        matches!(self, Linkage::Internal | Linkage::Private)
    }

    /// Definition yields to a strong definition of the same name
    pub fn is_overridable(&self) -> bool {
        matches!(self, Linkage::Weak | Linkage::LinkOnce)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Linkage::External => "external",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
            Linkage::Weak => "weak",
            Linkage::LinkOnce => "linkonce",
        };
        write!(f, "{s}")
    }
}

/// Global variable; without initializer it is a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub var_type: IrType,
    #[serde(default)]
    pub is_constant: bool,
    #[serde(default)]
    pub initializer: Option<Value>,
    #[serde(default)]
    pub linkage: Linkage,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, var_type: IrType, initializer: Option<Value>) -> Self {
        Self {
            name: name.into(),
            var_type,
            is_constant: false,
            initializer,
            linkage: Linkage::External,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }
}

/// Named alias of another global or function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub aliasee: String,
    #[serde(default)]
    pub linkage: Linkage,
}

impl Alias {
    pub fn new(name: impl Into<String>, aliasee: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliasee: aliasee.into(),
            linkage: Linkage::External,
        }
    }
}

/// IR Module - represents a complete compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target_triple: String,
    #[serde(default)]
    pub data_layout: Option<String>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn add_global(&mut self, global: GlobalVariable) {
        self.globals.push(global);
    }

    pub fn add_alias(&mut self, alias: Alias) {
        self.aliases.push(alias);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn get_global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn get_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    /// Any function, global or alias carries this name
    pub fn has_symbol(&self, name: &str) -> bool {
        self.get_function(name).is_some() || self.get_global(name).is_some() || self.get_alias(name).is_some()
    }

    /// Linkage of the function, global or alias called `name`
    pub fn linkage_of(&self, name: &str) -> Option<Linkage> {
        self.get_function(name)
            .map(|f| f.linkage)
            .or_else(|| self.get_global(name).map(|g| g.linkage))
            .or_else(|| self.get_alias(name).map(|a| a.linkage))
    }

    /// Names of every local (internal or private) symbol
    pub fn local_symbols(&self) -> Vec<String> {
        let functions = self.functions.iter().filter(|f| f.linkage.is_local()).map(|f| &f.name);
        let globals = self.globals.iter().filter(|g| g.linkage.is_local()).map(|g| &g.name);
        let aliases = self.aliases.iter().filter(|a| a.linkage.is_local()).map(|a| &a.name);
        functions.chain(globals).chain(aliases).cloned().collect()
    }

    /// This module provides a definition (function body, initialized global
    /// or alias) for `name`
    pub fn defines(&self, name: &str) -> bool {
        self.get_function(name).is_some_and(|f| !f.is_declaration())
            || self.get_global(name).is_some_and(|g| !g.is_declaration())
            || self.get_alias(name).is_some()
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let idx = self.functions.iter().position(|f| f.name == name)?;
        Some(self.functions.remove(idx))
    }

    pub fn remove_global(&mut self, name: &str) -> Option<GlobalVariable> {
        let idx = self.globals.iter().position(|g| g.name == name)?;
        Some(self.globals.remove(idx))
    }

    pub fn remove_alias(&mut self, name: &str) -> Option<Alias> {
        let idx = self.aliases.iter().position(|a| a.name == name)?;
        Some(self.aliases.remove(idx))
    }

    /// Module holds no symbols at all
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.globals.is_empty() && self.aliases.is_empty()
    }

    /// Return the function named `name`, declaring it first if missing
    pub fn get_or_insert_function(
        &mut self,
        name: &str,
        return_type: IrType,
        param_types: Vec<IrType>,
    ) -> &mut Function {
        let idx = match self.functions.iter().position(|f| f.name == name) {
            Some(idx) => idx,
            None => {
                self.functions.push(Function::declaration(name, return_type, param_types));
                self.functions.len() - 1
            }
        };
        &mut self.functions[idx]
    }

    /// Visit every value in instructions, initializers (read-only)
    pub fn visit_values(&self, mut f: impl FnMut(&Value)) {
        for function in &self.functions {
            for instr in function.instructions() {
                instr.operands().into_iter().for_each(&mut f);
            }
        }
        for global in &self.globals {
            if let Some(init) = &global.initializer {
                f(init);
            }
        }
    }

    /// Visit every value in instructions and initializers mutably
    pub fn visit_values_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        for function in &mut self.functions {
            for instr in function.instructions_mut() {
                instr.operands_mut().into_iter().for_each(&mut f);
            }
        }
        for global in &mut self.globals {
            if let Some(init) = &mut global.initializer {
                f(init);
            }
        }
    }

    /// Number of references to the symbol `name` from instructions,
    /// initializers and aliases
    pub fn use_count(&self, name: &str) -> usize {
        let mut count = self.aliases.iter().filter(|a| a.aliasee == name).count();
        self.visit_values(|v| {
            if v.symbol_name() == Some(name) {
                count += 1;
            }
        });
        count
    }

    /// Point every reference to `old` at `new` (functions, globals, aliases)
    pub fn replace_symbol_uses(&mut self, old: &str, new: &str) {
        self.visit_values_mut(|v| match v {
            Value::Function(name) | Value::Global(name) if *name == old => *name = new.to_string(),
            _ => {}
        });
        for alias in &mut self.aliases {
            if alias.aliasee == old {
                alias.aliasee = new.to_string();
            }
        }
    }

    /// Rename a function and every reference to it
    pub fn rename_function(&mut self, old: &str, new: &str) -> bool {
        match self.get_function_mut(old) {
            Some(function) => function.name = new.to_string(),
            None => return false,
        }
        self.replace_symbol_uses(old, new);
        true
    }

    /// Rename a global variable and every reference to it
    pub fn rename_global(&mut self, old: &str, new: &str) -> bool {
        match self.globals.iter_mut().find(|g| g.name == old) {
            Some(global) => global.name = new.to_string(),
            None => return false,
        }
        self.replace_symbol_uses(old, new);
        true
    }

    /// Rename whichever function, global or alias is called `old`
    pub fn rename_symbol(&mut self, old: &str, new: &str) -> bool {
        if self.rename_function(old, new) || self.rename_global(old, new) {
            return true;
        }
        match self.aliases.iter_mut().find(|a| a.name == old) {
            Some(alias) => alias.name = new.to_string(),
            None => return false,
        }
        self.replace_symbol_uses(old, new);
        true
    }

    /// First unused name of the form `base.N`
    pub fn unique_name(&self, base: &str) -> String {
        (1..)
            .map(|n| format!("{base}.{n}"))
            .find(|candidate| !self.has_symbol(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Names of every function called directly from a defined function
    pub fn called_functions(&self) -> Vec<&str> {
        self.functions
            .iter()
            .flat_map(|f| f.instructions())
            .filter_map(Instruction::called_function)
            .collect()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        if let Some(layout) = &self.data_layout {
            writeln!(f, "target datalayout = \"{layout}\"")?;
        }
        if !self.target_triple.is_empty() {
            writeln!(f, "target triple = \"{}\"", self.target_triple)?;
        }
        for global in &self.globals {
            let kind = if global.is_constant { "constant" } else { "global" };
            match &global.initializer {
                Some(init) => writeln!(f, "\n@{} = {} {kind} {} {init}", global.name, global.linkage, global.var_type)?,
                None => writeln!(f, "\n@{} = external {kind} {}", global.name, global.var_type)?,
            }
        }
        for alias in &self.aliases {
            writeln!(f, "\n@{} = {} alias @{}", alias.name, alias.linkage, alias.aliasee)?;
        }
        for function in &self.functions {
            let params: Vec<String> = function
                .parameters
                .iter()
                .map(|(id, ty)| format!("{ty} %{id}"))
                .collect();
            let mut params = params.join(", ");
            if function.is_vararg {
                params.push_str(if params.is_empty() { "..." } else { ", ..." });
            }
            let attrs = &function.attributes;
            let mut attr_text = String::new();
            if attrs.no_return { attr_text.push_str(" noreturn"); }
            if attrs.no_inline { attr_text.push_str(" noinline"); }
            if attrs.optimize_none { attr_text.push_str(" optnone"); }
            if function.is_declaration() {
                writeln!(f, "\ndeclare {} @{}({params}){attr_text}", function.return_type, function.name)?;
                continue;
            }
            writeln!(
                f,
                "\ndefine {} {} @{}({params}){attr_text} {{",
                function.linkage, function.return_type, function.name
            )?;
            for block in &function.blocks {
                writeln!(f, "L{}:", block.id)?;
                for instr in &block.instructions {
                    writeln!(f, "  {instr}")?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
