use fsl_common::{LinkerError, Reporter};
use fsl_ir::{
    AtomicOrdering, AtomicRmwOp, BasicBlock, Function, GlobalVariable, Instruction, IrBinaryOp, IrType, Linkage, Module,
    Value,
};
use fsl_linker::{
    externals_and_globals_check, link_with_libc, load_file, prepare_posix, JsonLoader, Linker, LinkerConfig,
    ModuleOptions, StartupContract, WorkingModule,
};
use pretty_assertions::assert_eq;
use std::path::Path;

fn call(callee: &str, args: Vec<Value>, result: Option<u32>, result_type: IrType) -> Instruction {
    Instruction::Call {
        result,
        callee: Value::Function(callee.to_string()),
        args,
        result_type,
    }
}

/// Void function `name` calling each of `callees`, which are declared in
/// the same module
fn module_defining(name: &str, callees: &[&str]) -> Module {
    let mut module = Module::new(name);
    let mut function = Function::new(name, IrType::Void);
    let mut block = BasicBlock::new(0);
    for callee in callees {
        block.add_instruction(call(callee, Vec::new(), None, IrType::Void));
        module.add_function(Function::declaration(*callee, IrType::Void, Vec::new()));
    }
    block.add_instruction(Instruction::Return(None));
    function.add_block(block);
    module.add_function(function);
    module
}

/// `int main(void)` calling each of `callees`
fn program(callees: &[&str]) -> Module {
    let mut module = Module::new("prog");
    let mut main = Function::new("main", IrType::I32);
    let mut block = BasicBlock::new(0);
    for callee in callees {
        block.add_instruction(call(callee, Vec::new(), None, IrType::Void));
        module.add_function(Function::declaration(*callee, IrType::Void, Vec::new()));
    }
    block.add_instruction(Instruction::Return(Some(Value::Constant(0))));
    main.add_block(block);
    module.add_function(main);
    module
}

fn argv_type() -> IrType {
    IrType::ptr(IrType::ptr(IrType::I8))
}

fn write_module(dir: &Path, file: &str, module: &Module) -> std::path::PathBuf {
    let path = dir.join(file);
    let text = serde_json::to_string(module).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_unneeded_modules_are_left_over() {
    let mut modules = vec![
        program(&["b"]),
        module_defining("b", &[]),
        module_defining("c", &[]),
    ];
    let mut linker = Linker::default();
    let linked = linker.set_module(&mut modules, &ModuleOptions::default()).unwrap();

    assert!(linked.get_function("b").is_some_and(|f| !f.is_declaration()));
    assert!(linked.get_function("c").is_none());
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name, "c");
}

#[test]
fn test_dependencies_pulled_in_over_rounds() {
    // main -> a -> b, with the providers listed before their users
    let mut modules = vec![
        module_defining("b", &[]),
        module_defining("a", &["b"]),
        program(&["a"]),
    ];
    let mut linker = Linker::default();
    let linked = linker.set_module(&mut modules, &ModuleOptions::default()).unwrap();

    for name in ["main", "a", "b"] {
        assert!(linked.get_function(name).is_some_and(|f| !f.is_declaration()), "{name} not defined");
    }
    assert!(modules.is_empty());
}

#[test]
fn test_instrumentation_is_idempotent() {
    let mut module = Module::new("m");
    let mut function = Function::new("main", IrType::I32);
    function.add_parameter(0, IrType::ptr(IrType::I32));
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::AtomicRmw {
        result: 1,
        op: AtomicRmwOp::Add,
        ptr: Value::Temp(0),
        value: Value::Constant(1),
        result_type: IrType::I32,
        ordering: AtomicOrdering::SequentiallyConsistent,
    });
    block.add_instruction(call("llvm.dbg.value", Vec::new(), None, IrType::Void));
    block.add_instruction(Instruction::Fence { ordering: AtomicOrdering::SequentiallyConsistent });
    block.add_instruction(Instruction::Return(Some(Value::Temp(1))));
    function.add_block(block);
    module.add_function(function);
    module.add_function(Function::declaration("llvm.dbg.value", IrType::Void, Vec::new()));

    let mut working = WorkingModule::new(LinkerConfig::default());
    working.link(&mut vec![module], "main").unwrap();
    working.instrument();
    let once = working.module().clone();
    working.instrument();

    assert_eq!(working.module(), &once);
    assert!(once
        .functions
        .iter()
        .flat_map(|f| f.instructions())
        .all(|i| !matches!(i, Instruction::AtomicRmw { .. } | Instruction::Fence { .. })));
}

#[test]
fn test_optimization_keeps_preserved_names() {
    let mut module = program(&[]);
    for name in ["memset", "helper"] {
        let mut function = Function::new(name, IrType::Void);
        function.linkage = Linkage::Internal;
        let mut block = BasicBlock::new(0);
        block.add_instruction(Instruction::Return(None));
        function.add_block(block);
        module.add_function(function);
    }

    let mut linker = Linker::default();
    let linked = linker
        .set_module(&mut vec![module], &ModuleOptions::new("main", true))
        .unwrap();

    assert!(linked.get_function("main").is_some());
    assert!(linked.get_function("memset").is_some());
    assert!(linked.get_function("helper").is_none());
}

#[test]
fn test_optimization_keeps_preserved_signatures() {
    let mut module = Module::new("prog");
    for name in ["memset", "helper"] {
        let mut function = Function::declaration(name, IrType::Void, vec![IrType::I32]);
        function.linkage = Linkage::Internal;
        function.attributes.no_inline = true;
        let mut block = BasicBlock::new(0);
        block.add_instruction(Instruction::Return(None));
        function.add_block(block);
        module.add_function(function);
    }
    let mut main = Function::new("main", IrType::I32);
    let mut block = BasicBlock::new(0);
    block.add_instruction(call("memset", vec![Value::Constant(1)], None, IrType::Void));
    block.add_instruction(call("helper", vec![Value::Constant(1)], None, IrType::Void));
    block.add_instruction(Instruction::Return(Some(Value::Constant(0))));
    main.add_block(block);
    module.add_function(main);

    let mut linker = Linker::default();
    let linked = linker
        .set_module(&mut vec![module], &ModuleOptions::new("main", true))
        .unwrap();

    assert_eq!(linked.get_function("memset").unwrap().param_types(), vec![IrType::I32]);
    assert_eq!(linked.get_function("helper").unwrap().param_types(), Vec::<IrType>::new());
    let main = &linked.get_function("main").unwrap().blocks[0].instructions;
    assert_eq!(main[0], call("memset", vec![Value::Constant(1)], None, IrType::Void));
    assert_eq!(main[1], call("helper", Vec::new(), None, IrType::Void));
}

#[test]
fn test_optimization_resolves_folded_chains() {
    let mut module = Module::new("prog");
    let mut id = Function::declaration("id", IrType::I32, vec![IrType::I32]);
    id.linkage = Linkage::Internal;
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::Return(Some(Value::Temp(0))));
    id.add_block(block);
    module.add_function(id);
    let mut main = Function::new("main", IrType::I32);
    let mut block = BasicBlock::new(0);
    block.add_instruction(call("id", vec![Value::Constant(5)], Some(1), IrType::I32));
    block.add_instruction(call("id", vec![Value::Temp(1)], Some(2), IrType::I32));
    block.add_instruction(Instruction::Return(Some(Value::Temp(2))));
    main.add_block(block);
    module.add_function(main);

    let mut linker = Linker::default();
    let linked = linker
        .set_module(&mut vec![module], &ModuleOptions::new("main", true))
        .unwrap();

    assert_eq!(
        linked.get_function("main").unwrap().blocks[0].instructions,
        vec![Instruction::Return(Some(Value::Constant(5)))]
    );
}

#[test]
fn test_trap_in_unoptimized_function() {
    let mut module = Module::new("prog");
    module.add_function(Function::declaration("llvm.trap", IrType::Void, Vec::new()));
    let mut main = Function::declaration("main", IrType::I32, vec![IrType::I32]);
    let mut entry = BasicBlock::new(0);
    entry.add_instruction(call("llvm.trap", Vec::new(), None, IrType::Void));
    entry.add_instruction(Instruction::Binary {
        result: 1,
        op: IrBinaryOp::Add,
        lhs: Value::Temp(0),
        rhs: Value::Constant(1),
        result_type: IrType::I32,
    });
    entry.add_instruction(Instruction::Branch(1));
    main.add_block(entry);
    let mut exit = BasicBlock::new(1);
    exit.add_instruction(Instruction::Return(Some(Value::Temp(1))));
    main.add_block(exit);
    module.add_function(main);

    let config = LinkerConfig { engine_call_optimisation: false, ..LinkerConfig::default() };
    let mut linker = Linker::new(config);
    let linked = linker
        .set_module(&mut vec![module], &ModuleOptions::default())
        .unwrap();

    let main = linked.get_function("main").unwrap();
    assert!(main.attributes.optimize_none);
    assert_eq!(
        main.get_block(1).unwrap().instructions,
        vec![Instruction::Return(Some(Value::Undef))]
    );
}

#[test]
fn test_dtors_rejected() {
    let mut module = program(&[]);
    module.add_global(GlobalVariable::new("llvm.global_dtors", IrType::I32, Some(Value::Constant(0))));

    let err = Linker::default()
        .set_module(&mut vec![module], &ModuleOptions::default())
        .unwrap_err();
    assert_eq!(err, LinkerError::GlobalCtorsDtors);
}

#[test]
fn test_undefined_report_after_linking() {
    let mut modules = vec![program(&["fork", "puts", "malloc", "klee_assume"])];
    let mut linker = Linker::default();
    let linked = linker.set_module(&mut modules, &ModuleOptions::default()).unwrap();

    let mut reporter = Reporter::captured();
    externals_and_globals_check(linked, &mut reporter);
    assert_eq!(
        reporter.lines(),
        vec![
            "LINKER: undefined reference to function: puts".to_string(),
            "LINKER: undefined reference to function: fork (UNSAFE)!".to_string(),
        ]
    );
}

/// `int main(int argc, char **argv) { return 0; }`
fn user_program() -> Module {
    let mut module = Module::new("user");
    let mut main = Function::declaration("main", IrType::I32, vec![IrType::I32, argv_type()]);
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::Return(Some(Value::Constant(0))));
    main.add_block(block);
    module.add_function(main);
    module
}

/// libc runtime whose startup routine takes `arity` parameters
fn libc_runtime(arity: usize) -> Module {
    let mut module = Module::new("");
    let entry_type = IrType::ptr(IrType::I8);
    let mut params = vec![entry_type, IrType::I32, argv_type()];
    params.resize(arity, IrType::ptr(IrType::I8));
    let mut startup = Function::declaration("__uClibc_main", IrType::Void, params);
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::Return(None));
    startup.add_block(block);
    module.add_function(startup);
    module
}

/// POSIX runtime forwarding its arguments to the wrapped user entry
fn posix_runtime() -> Module {
    let mut module = Module::new("posix");
    let mut wrapper = Function::declaration("__klee_posix_wrapper", IrType::I32, vec![IrType::I32, argv_type()]);
    let mut block = BasicBlock::new(0);
    block.add_instruction(call(
        "__klee_posix_wrapped_main",
        vec![Value::Temp(0), Value::Temp(1)],
        Some(2),
        IrType::I32,
    ));
    block.add_instruction(Instruction::Return(Some(Value::Temp(2))));
    wrapper.add_block(block);
    module.add_function(wrapper);
    module.add_function(Function::declaration(
        "__klee_posix_wrapped_main",
        IrType::I32,
        vec![IrType::I32, argv_type()],
    ));
    module
}

#[test]
fn test_posix_and_libc_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let libc_path = write_module(dir.path(), "libc.json", &libc_runtime(7));

    let mut modules = vec![user_program(), posix_runtime()];
    prepare_posix(&mut modules, "main", "__user_").unwrap();

    let mut reporter = Reporter::captured();
    link_with_libc(
        &JsonLoader,
        &libc_path,
        &mut modules,
        "main",
        &StartupContract::default(),
        &mut reporter,
    )
    .unwrap();
    assert_eq!(modules.len(), 3);
    assert_eq!(modules[2].name, "libc");
    assert_eq!(
        reporter.lines(),
        vec![format!("LINKER: NOTE: Using uclibc : {}", libc_path.display())]
    );

    let mut linker = Linker::default();
    let linked = linker.set_module(&mut modules, &ModuleOptions::default()).unwrap();
    assert!(modules.is_empty());

    for name in ["main", "__user_main", "__klee_posix_wrapped_main", "__uClibc_main"] {
        assert!(linked.get_function(name).is_some_and(|f| !f.is_declaration()), "{name} not defined");
    }
    let trampoline = linked.get_function("main").unwrap();
    assert_eq!(trampoline.param_types(), vec![IrType::I32, argv_type()]);
    assert!(externals_and_globals_check(linked, &mut Reporter::captured()).is_empty());
}

#[test]
fn test_libc_with_wrong_startup_arity() {
    let dir = tempfile::tempdir().unwrap();
    let libc_path = write_module(dir.path(), "libc.json", &libc_runtime(6));

    let mut modules = vec![user_program()];
    let err = link_with_libc(
        &JsonLoader,
        &libc_path,
        &mut modules,
        "main",
        &StartupContract::default(),
        &mut Reporter::captured(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        LinkerError::StartupArity {
            name: "__uClibc_main".to_string(),
            expected: 7,
            found: 6,
        }
    );
    assert!(modules[0].get_function("main").is_some());
    assert!(modules[1].get_function("main").is_none());
}

#[test]
fn test_missing_libc_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = link_with_libc(
        &JsonLoader,
        &dir.path().join("missing.json"),
        &mut vec![user_program()],
        "main",
        &StartupContract::default(),
        &mut Reporter::captured(),
    )
    .unwrap_err();
    let LinkerError::Load { message, .. } = err else {
        panic!("expected a load error");
    };
    assert!(message.starts_with("Cannot find uclibc: "));
}

#[test]
fn test_json_archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.jsonar");
    let archive = vec![module_defining("a", &[]), Module::new("")];
    std::fs::write(&path, serde_json::to_string(&archive).unwrap()).unwrap();

    let mut modules = vec![program(&[])];
    let added = load_file(&JsonLoader, &path, &mut modules).unwrap();

    assert_eq!(added, 2);
    assert_eq!(modules[1], archive[0]);
    assert_eq!(modules[2].name, "lib(1)");
}
