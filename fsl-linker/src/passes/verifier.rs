//! Structural verifier
//!
//! Never modifies the module. Problems are collected as readable strings
//! and read back through `errors()` after `run`.

use fsl_ir::{Function, Instruction, Module, TempId, Value};
use std::collections::{HashMap, HashSet};
use super::ModulePass;

#[derive(Default)]
pub struct Verifier {
    errors: Vec<String>,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn check_symbols(&mut self, module: &Module) {
        let mut seen = HashSet::new();
        let names = module
            .functions
            .iter()
            .map(|f| &f.name)
            .chain(module.globals.iter().map(|g| &g.name))
            .chain(module.aliases.iter().map(|a| &a.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                self.errors.push(format!("symbol '{name}' defined more than once"));
            }
        }
        for alias in &module.aliases {
            if !module.has_symbol(&alias.aliasee) {
                self.errors.push(format!(
                    "alias '{}' refers to unknown symbol '{}'",
                    alias.name, alias.aliasee
                ));
            }
        }
        for global in &module.globals {
            if let Some(init) = &global.initializer {
                self.check_symbol_ref(module, &global.name, init);
            }
        }
    }

    fn check_symbol_ref(&mut self, module: &Module, context: &str, value: &Value) {
        match value {
            Value::Global(name) if module.get_global(name).is_none() && module.get_alias(name).is_none() => {
                self.errors.push(format!("{context}: reference to unknown global '{name}'"));
            }
            Value::Function(name) if module.get_function(name).is_none() && module.get_alias(name).is_none() => {
                self.errors.push(format!("{context}: reference to unknown function '{name}'"));
            }
            _ => {}
        }
    }

    fn check_function(&mut self, module: &Module, function: &Function) {
        if function.is_declaration() {
            return;
        }
        let name = &function.name;
        let labels: HashSet<_> = function.blocks.iter().map(|b| b.id).collect();
        if labels.len() != function.blocks.len() {
            self.errors.push(format!("{name}: duplicate block label"));
        }

        // Single definition of every temp
        let mut defined: HashSet<TempId> = HashSet::new();
        for (id, _) in &function.parameters {
            if !defined.insert(*id) {
                self.errors.push(format!("{name}: parameter %{id} defined twice"));
            }
        }
        for instr in function.instructions() {
            for id in instr.defined_temps() {
                if !defined.insert(id) {
                    self.errors.push(format!("{name}: temporary %{id} defined more than once"));
                }
            }
        }

        let preds = function.predecessors();
        let params: HashSet<TempId> = function.parameters.iter().map(|(id, _)| *id).collect();
        let block_of: HashMap<TempId, usize> = function
            .blocks
            .iter()
            .enumerate()
            .flat_map(|(index, b)| b.instructions.iter().flat_map(move |i| i.defined_temps()).map(move |t| (t, index)))
            .collect();

        for (block_index, block) in function.blocks.iter().enumerate() {
            let label = block.id;
            let terminators = block.instructions.iter().filter(|i| i.is_terminator()).count();
            if terminators != 1 || !block.has_terminator() {
                self.errors.push(format!(
                    "{name}: block {label} must end with exactly one terminator"
                ));
            }
            for succ in block.successors() {
                if !labels.contains(&succ) {
                    self.errors.push(format!("{name}: block {label} branches to unknown block {succ}"));
                }
            }

            let mut local: HashSet<TempId> = HashSet::new();
            let mut leading = true;
            for instr in &block.instructions {
                match instr {
                    Instruction::Phi { result, incoming, .. } => {
                        if !leading {
                            self.errors.push(format!("{name}: phi %{result} is not at the start of block {label}"));
                        }
                        let mut expected: Vec<_> = preds.get(&label).cloned().unwrap_or_default();
                        let mut actual: Vec<_> = incoming.iter().map(|(_, l)| *l).collect();
                        expected.sort_unstable();
                        actual.sort_unstable();
                        actual.dedup();
                        if expected != actual || incoming.len() != actual.len() {
                            self.errors.push(format!(
                                "{name}: phi %{result} incoming blocks do not match predecessors of block {label}"
                            ));
                        }
                    }
                    _ => leading = false,
                }

                for operand in instr.operands() {
                    self.check_symbol_ref(module, name, operand);
                    let Some(temp) = operand.as_temp() else {
                        continue;
                    };
                    if !defined.contains(&temp) {
                        self.errors.push(format!("{name}: use of undefined temporary %{temp}"));
                        continue;
                    }
                    // Phi operands flow in along edges; other same-block uses need the definition first
                    let same_block = block_of.get(&temp) == Some(&block_index);
                    if !instr.is_phi() && same_block && !params.contains(&temp) && !local.contains(&temp) {
                        self.errors.push(format!("{name}: %{temp} used before its definition"));
                    }
                }
                local.extend(instr.defined_temps());

                if let Some(callee) = instr.called_function() {
                    self.check_call(module, name, callee, instr);
                }
            }
        }
    }

    fn check_call(&mut self, module: &Module, context: &str, callee: &str, instr: &Instruction) {
        let Some(target) = resolve(module, callee) else {
            return;
        };
        let args = match instr {
            Instruction::Call { args, .. } | Instruction::Invoke { args, .. } => args.len(),
            _ => return,
        };
        let params = target.parameters.len();
        let ok = if target.is_vararg { args >= params } else { args == params };
        if !ok {
            self.errors.push(format!(
                "{context}: call to '{callee}' passes {args} argument(s), expected {params}"
            ));
        }
    }
}

/// The function named directly or through an alias chain
fn resolve<'m>(module: &'m Module, name: &str) -> Option<&'m Function> {
    let mut current = name;
    for _ in 0..=module.aliases.len() {
        if let Some(function) = module.get_function(current) {
            return Some(function);
        }
        current = &module.get_alias(current)?.aliasee;
    }
    None
}

impl ModulePass for Verifier {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        self.errors.clear();
        self.check_symbols(module);
        for function in &module.functions {
            self.check_function(module, function);
        }
        false
    }
}
