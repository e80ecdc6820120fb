use super::*;
use crate::options::OptNoneScope;
use fsl_ir::{
    Alias, AtomicOrdering, AtomicRmwOp, BasicBlock, DataLayout, Function, Instruction, IrBinaryOp, IrType,
    LabelId, Linkage, Module, Value,
};
use pretty_assertions::assert_eq;

fn block(id: LabelId, instructions: Vec<Instruction>) -> BasicBlock {
    let mut block = BasicBlock::new(id);
    for instr in instructions {
        block.add_instruction(instr);
    }
    block
}

fn function(name: &str, ret: IrType, params: &[IrType], blocks: Vec<BasicBlock>) -> Function {
    let mut function = Function::new(name, ret);
    for (i, ty) in params.iter().enumerate() {
        function.add_parameter(i as u32, ty.clone());
    }
    for b in blocks {
        function.add_block(b);
    }
    function
}

fn call(result: Option<u32>, callee: &str, args: Vec<Value>, ty: IrType) -> Instruction {
    Instruction::Call {
        result,
        callee: Value::Function(callee.to_string()),
        args,
        result_type: ty,
    }
}

fn binary(result: u32, op: IrBinaryOp, lhs: Value, rhs: Value, ty: IrType) -> Instruction {
    Instruction::Binary { result, op, lhs, rhs, result_type: ty }
}

fn ret(value: Option<Value>) -> Instruction {
    Instruction::Return(value)
}

fn verify(module: &Module) -> Vec<String> {
    let mut verifier = Verifier::new();
    verifier.run(&mut module.clone());
    verifier.errors().to_vec()
}

fn body(module: &Module, name: &str) -> Vec<Instruction> {
    module
        .get_function(name)
        .map(|f| f.instructions().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn test_pass_manager_runs_in_order() {
    let mut manager = PassManager::new();
    manager.add(RaiseAsm);
    manager.add(Scalarizer);
    manager.add(LowerAtomic);
    assert_eq!(manager.names(), vec!["raise-asm", "scalarizer", "lower-atomic"]);

    let mut module = Module::new("empty");
    assert!(!manager.run(&mut module));
}

#[test]
fn test_raise_asm_barrier_and_bswap() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[IrType::I32],
        vec![block(0, vec![
            Instruction::Call {
                result: None,
                callee: Value::InlineAsm {
                    assembly: String::new(),
                    constraints: "~{memory},~{dirflag},~{fpsr},~{flags}".to_string(),
                },
                args: Vec::new(),
                result_type: IrType::Void,
            },
            Instruction::Call {
                result: Some(1),
                callee: Value::InlineAsm {
                    assembly: "bswap $0".to_string(),
                    constraints: "=r,0,~{dirflag},~{fpsr},~{flags}".to_string(),
                },
                args: vec![Value::Temp(0)],
                result_type: IrType::I32,
            },
            ret(Some(Value::Temp(1))),
        ])],
    ));

    assert!(RaiseAsm.run(&mut module));
    assert_eq!(
        body(&module, "f"),
        vec![
            Instruction::Fence { ordering: AtomicOrdering::SequentiallyConsistent },
            call(Some(1), "llvm.bswap.i32", vec![Value::Temp(0)], IrType::I32),
            ret(Some(Value::Temp(1))),
        ]
    );
    let bswap = module.get_function("llvm.bswap.i32").unwrap();
    assert!(bswap.is_declaration());
    assert_eq!(bswap.param_types(), vec![IrType::I32]);
    assert!(!RaiseAsm.run(&mut module));
}

#[test]
fn test_lower_atomic_rmw_and_fence() {
    let int_ptr = IrType::ptr(IrType::I32);
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[int_ptr],
        vec![block(0, vec![
            Instruction::AtomicRmw {
                result: 1,
                op: AtomicRmwOp::Add,
                ptr: Value::Temp(0),
                value: Value::Constant(5),
                result_type: IrType::I32,
                ordering: AtomicOrdering::SequentiallyConsistent,
            },
            Instruction::Fence { ordering: AtomicOrdering::Acquire },
            ret(Some(Value::Temp(1))),
        ])],
    ));

    assert!(LowerAtomic.run(&mut module));
    assert_eq!(
        body(&module, "f"),
        vec![
            Instruction::Load { result: 1, ptr: Value::Temp(0), result_type: IrType::I32, ordering: None },
            binary(2, IrBinaryOp::Add, Value::Temp(1), Value::Constant(5), IrType::I32),
            Instruction::Store { value: Value::Temp(2), value_type: IrType::I32, ptr: Value::Temp(0), ordering: None },
            ret(Some(Value::Temp(1))),
        ]
    );
    assert!(!LowerAtomic.run(&mut module));
}

#[test]
fn test_lower_atomic_cmpxchg() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I1,
        &[IrType::ptr(IrType::I64)],
        vec![block(0, vec![
            Instruction::CmpXchg {
                result: 1,
                success: 2,
                ptr: Value::Temp(0),
                expected: Value::Constant(0),
                new_value: Value::Constant(7),
                result_type: IrType::I64,
                ordering: AtomicOrdering::AcquireRelease,
            },
            ret(Some(Value::Temp(2))),
        ])],
    ));

    assert!(LowerAtomic.run(&mut module));
    let instrs = body(&module, "f");
    assert_eq!(instrs.len(), 5);
    assert!(matches!(instrs[1], Instruction::Binary { result: 2, op: IrBinaryOp::Eq, .. }));
    assert!(matches!(instrs[2], Instruction::Select { result: 3, condition: Value::Temp(2), .. }));
    assert!(verify(&module).is_empty());
}

#[test]
fn test_intrinsic_cleaner_memory_and_debug() {
    let byte_ptr = IrType::ptr(IrType::I8);
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::Void,
        &[byte_ptr.clone(), byte_ptr.clone(), IrType::I64],
        vec![block(0, vec![
            call(None, "llvm.dbg.value", vec![Value::Temp(0)], IrType::Void),
            call(
                None,
                "llvm.memcpy.p0i8.p0i8.i64",
                vec![Value::Temp(0), Value::Temp(1), Value::Temp(2), Value::Constant(0)],
                IrType::Void,
            ),
            ret(None),
        ])],
    ));
    module.add_function(Function::declaration("llvm.dbg.value", IrType::Void, vec![byte_ptr.clone()]));
    module.add_function(Function::declaration(
        "llvm.memcpy.p0i8.p0i8.i64",
        IrType::Void,
        vec![byte_ptr.clone(), byte_ptr.clone(), IrType::I64, IrType::I1],
    ));

    let mut cleaner = IntrinsicCleaner::new(DataLayout::default());
    assert!(cleaner.run(&mut module));
    assert_eq!(
        body(&module, "f"),
        vec![
            call(
                None,
                "memcpy",
                vec![Value::Temp(0), Value::Temp(1), Value::Temp(2)],
                byte_ptr.clone(),
            ),
            ret(None),
        ]
    );
    assert_eq!(
        module.get_function("memcpy").map(|f| f.param_types()),
        Some(vec![byte_ptr.clone(), byte_ptr, IrType::I64])
    );
    assert!(module.functions.iter().all(|f| !f.name.starts_with("llvm.")));
    assert!(!cleaner.run(&mut module));
}

#[test]
fn test_intrinsic_cleaner_trap_and_expect() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I64,
        &[IrType::I64],
        vec![block(0, vec![
            call(Some(1), "llvm.expect.i64", vec![Value::Temp(0), Value::Constant(1)], IrType::I64),
            ret(Some(Value::Temp(1))),
        ])],
    ));
    module.add_function(function(
        "g",
        IrType::Void,
        &[],
        vec![block(0, vec![call(None, "llvm.trap", Vec::new(), IrType::Void), ret(None)])],
    ));

    let mut cleaner = IntrinsicCleaner::new(DataLayout::default());
    assert!(cleaner.run(&mut module));
    assert_eq!(body(&module, "f"), vec![ret(Some(Value::Temp(0)))]);
    assert_eq!(
        body(&module, "g"),
        vec![call(None, "abort", Vec::new(), IrType::Void), Instruction::Unreachable]
    );
    assert!(module.get_function("abort").unwrap().attributes.no_return);
}

#[test]
fn test_intrinsic_cleaner_chained_expect() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[IrType::I32],
        vec![block(0, vec![
            call(Some(1), "llvm.expect.i32", vec![Value::Temp(0), Value::Constant(1)], IrType::I32),
            call(Some(2), "llvm.expect.i32", vec![Value::Temp(1), Value::Constant(1)], IrType::I32),
            ret(Some(Value::Temp(2))),
        ])],
    ));

    assert!(IntrinsicCleaner::new(DataLayout::default()).run(&mut module));
    assert_eq!(body(&module, "f"), vec![ret(Some(Value::Temp(0)))]);
    assert!(verify(&module).is_empty());
}

#[test]
fn test_intrinsic_cleaner_trap_drops_later_results() {
    let mut module = Module::new("m");
    let mut f = function(
        "f",
        IrType::I32,
        &[IrType::I32],
        vec![
            block(0, vec![
                call(None, "llvm.trap", Vec::new(), IrType::Void),
                binary(1, IrBinaryOp::Add, Value::Temp(0), Value::Constant(1), IrType::I32),
                Instruction::Branch(1),
            ]),
            block(1, vec![ret(Some(Value::Temp(1)))]),
        ],
    );
    f.attributes.optimize_none = true;
    module.add_function(f);

    assert!(IntrinsicCleaner::new(DataLayout::default()).run(&mut module));
    assert_eq!(
        body(&module, "f"),
        vec![
            call(None, "abort", Vec::new(), IrType::Void),
            Instruction::Unreachable,
            ret(Some(Value::Undef)),
        ]
    );
    assert!(verify(&module).is_empty());
}

#[test]
fn test_scalarizer_removes_vector_operands() {
    let vec4 = IrType::vector(4, IrType::I32);
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::Void,
        &[vec4.clone(), vec4.clone(), IrType::ptr(vec4.clone())],
        vec![block(0, vec![
            binary(3, IrBinaryOp::Add, Value::Temp(0), Value::Temp(1), vec4.clone()),
            Instruction::Store { value: Value::Temp(3), value_type: vec4, ptr: Value::Temp(2), ordering: None },
            ret(None),
        ])],
    ));

    let mut check = OperandTypeCheck::new();
    check.run(&mut module);
    assert!(!check.passed());

    assert!(Scalarizer.run(&mut module));
    check.run(&mut module);
    assert_eq!(check.violations(), &[] as &[String]);
    assert!(verify(&module).is_empty());

    let adds = body(&module, "f")
        .iter()
        .filter(|i| matches!(i, Instruction::Binary { result_type: IrType::I32, .. }))
        .count();
    assert_eq!(adds, 4);
    assert!(!Scalarizer.run(&mut module));
}

#[test]
fn test_scalarizer_vector_phi() {
    let vec2 = IrType::vector(2, IrType::I64);
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::Void,
        &[vec2.clone(), IrType::I1, IrType::ptr(vec2.clone())],
        vec![
            block(0, vec![Instruction::BranchCond {
                condition: Value::Temp(1),
                true_label: 1,
                false_label: 2,
            }]),
            block(1, vec![Instruction::Branch(2)]),
            block(2, vec![
                Instruction::Phi {
                    result: 3,
                    incoming: vec![
                        (Value::Temp(0), 0),
                        (Value::ConstantVector { elements: vec![1, 2], element_type: IrType::I64 }, 1),
                    ],
                    result_type: vec2.clone(),
                },
                Instruction::Store { value: Value::Temp(3), value_type: vec2, ptr: Value::Temp(2), ordering: None },
                ret(None),
            ]),
        ],
    ));

    assert!(Scalarizer.run(&mut module));
    let mut check = OperandTypeCheck::new();
    check.run(&mut module);
    assert!(check.passed());
    assert!(verify(&module).is_empty(), "{:?}", verify(&module));

    let f = module.get_function("f").unwrap();
    let entry = f.get_block(0).unwrap();
    // Lane extracts for the incoming vector run in the predecessor
    assert_eq!(
        entry.instructions.iter().filter(|i| matches!(i, Instruction::ExtractElement { .. })).count(),
        2
    );
    assert!(f.get_block(2).unwrap().instructions[0].is_phi());
}

fn switch_function() -> Module {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[IrType::I32],
        vec![
            block(0, vec![Instruction::Switch {
                value: Value::Temp(0),
                value_type: IrType::I32,
                default: 3,
                cases: vec![(2, 2), (1, 1)],
            }]),
            block(1, vec![Instruction::Branch(3)]),
            block(2, vec![Instruction::Branch(3)]),
            block(3, vec![
                Instruction::Phi {
                    result: 1,
                    incoming: vec![(Value::Constant(10), 0), (Value::Constant(20), 1), (Value::Constant(30), 2)],
                    result_type: IrType::I32,
                },
                ret(Some(Value::Temp(1))),
            ]),
        ],
    ));
    module
}

fn has_switch(module: &Module) -> bool {
    module
        .functions
        .iter()
        .flat_map(|f| f.instructions())
        .any(|i| matches!(i, Instruction::Switch { .. }))
}

#[test]
fn test_lower_switch_chain() {
    let mut module = switch_function();
    let mut pass = LowerSwitch::simple();
    assert_eq!(pass.name(), "lower-switch-simple");
    assert!(pass.run(&mut module));
    assert!(!has_switch(&module));
    assert_eq!(verify(&module), Vec::<String>::new());

    let f = module.get_function("f").unwrap();
    let Instruction::Phi { incoming, .. } = &f.get_block(3).unwrap().instructions[0] else {
        panic!("expected phi");
    };
    assert_eq!(
        incoming.clone(),
        vec![(Value::Constant(20), 1), (Value::Constant(30), 2), (Value::Constant(10), 5)]
    );
}

#[test]
fn test_lower_switch_binary_search() {
    let mut module = switch_function();
    let mut pass = LowerSwitch::general();
    assert!(pass.run(&mut module));
    assert!(!has_switch(&module));
    assert_eq!(verify(&module), Vec::<String>::new());

    let f = module.get_function("f").unwrap();
    assert_eq!(f.blocks.len(), 7);
    assert_eq!(f.get_block(0).unwrap().instructions, vec![Instruction::Branch(4)]);
    assert!(!pass.run(&mut module));
}

fn constant_branch() -> Module {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[],
        vec![
            block(0, vec![Instruction::BranchCond {
                condition: Value::Constant(1),
                true_label: 1,
                false_label: 2,
            }]),
            block(1, vec![ret(Some(Value::Constant(1)))]),
            block(2, vec![ret(Some(Value::Constant(2)))]),
        ],
    ));
    module
}

#[test]
fn test_cfg_simplify_folds_and_merges() {
    let mut module = constant_branch();
    assert!(CfgSimplify.run(&mut module));
    let f = module.get_function("f").unwrap();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].instructions, vec![ret(Some(Value::Constant(1)))]);
    assert!(!CfgSimplify.run(&mut module));
}

#[test]
fn test_cfg_simplify_skips_optnone() {
    let mut module = constant_branch();
    module.get_function_mut("f").unwrap().attributes.optimize_none = true;
    let before = module.clone();
    assert!(!CfgSimplify.run(&mut module));
    assert_eq!(module, before);
}

#[test]
fn test_phi_cleaner_reorders_incoming() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[IrType::I1],
        vec![
            block(0, vec![Instruction::BranchCond { condition: Value::Temp(0), true_label: 1, false_label: 2 }]),
            block(1, vec![Instruction::Branch(3)]),
            block(2, vec![Instruction::Branch(3)]),
            block(3, vec![
                Instruction::Phi {
                    result: 1,
                    incoming: vec![(Value::Constant(1), 1), (Value::Constant(2), 2)],
                    result_type: IrType::I32,
                },
                Instruction::Phi {
                    result: 2,
                    incoming: vec![(Value::Constant(3), 2), (Value::Constant(4), 1)],
                    result_type: IrType::I32,
                },
                ret(Some(Value::Temp(2))),
            ]),
        ],
    ));

    assert!(PhiCleaner.run(&mut module));
    let f = module.get_function("f").unwrap();
    let Instruction::Phi { incoming, .. } = &f.get_block(3).unwrap().instructions[1] else {
        panic!("expected phi");
    };
    assert_eq!(incoming.clone(), vec![(Value::Constant(4), 1), (Value::Constant(3), 2)]);
    assert!(!PhiCleaner.run(&mut module));
}

#[test]
fn test_function_alias_resolution() {
    let mut module = Module::new("m");
    module.add_function(function("impl_fn", IrType::Void, &[], vec![block(0, vec![ret(None)])]));
    module.add_function(function(
        "main",
        IrType::Void,
        &[],
        vec![block(0, vec![call(None, "outer", Vec::new(), IrType::Void), ret(None)])],
    ));
    module.add_alias(Alias::new("inner", "impl_fn"));
    module.add_alias(Alias::new("outer", "inner"));

    assert!(FunctionAlias.run(&mut module));
    assert!(module.aliases.is_empty());
    assert_eq!(body(&module, "main")[0], call(None, "impl_fn", Vec::new(), IrType::Void));
}

#[test]
fn test_opt_none_scopes() {
    let mut module = Module::new("m");
    module.add_function(function(
        "uses_engine",
        IrType::Void,
        &[],
        vec![block(0, vec![call(None, "klee_make_symbolic", Vec::new(), IrType::Void), ret(None)])],
    ));
    module.add_function(function("plain", IrType::Void, &[], vec![block(0, vec![ret(None)])]));

    let mut selective = module.clone();
    assert!(OptNone::new(OptNoneScope::EngineCallers).run(&mut selective));
    assert!(selective.get_function("uses_engine").unwrap().attributes.optimize_none);
    assert!(!selective.get_function("plain").unwrap().attributes.optimize_none);

    let mut pass = OptNone::new(OptNoneScope::Module);
    assert!(pass.run(&mut module));
    assert!(module.functions.iter().all(|f| f.attributes.optimize_none && f.attributes.no_inline));
    assert!(!pass.run(&mut module));
}

#[test]
fn test_optimizer_folds_constants() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[],
        vec![block(0, vec![
            binary(0, IrBinaryOp::Add, Value::Constant(2), Value::Constant(3), IrType::I32),
            binary(1, IrBinaryOp::Mul, Value::Temp(0), Value::Constant(4), IrType::I32),
            ret(Some(Value::Temp(1))),
        ])],
    ));

    assert!(Optimizer::new(Vec::<String>::new()).run(&mut module));
    assert_eq!(body(&module, "f"), vec![ret(Some(Value::Constant(20)))]);
}

#[test]
fn test_optimizer_folds_through_select() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[],
        vec![block(0, vec![
            binary(0, IrBinaryOp::Add, Value::Constant(1), Value::Constant(2), IrType::I32),
            Instruction::Select {
                result: 1,
                condition: Value::Constant(1),
                true_value: Value::Temp(0),
                false_value: Value::Temp(0),
                result_type: IrType::I32,
            },
            ret(Some(Value::Temp(1))),
        ])],
    ));

    assert!(Optimizer::new(Vec::<String>::new()).run(&mut module));
    assert_eq!(body(&module, "f"), vec![ret(Some(Value::Constant(3)))]);
    assert!(verify(&module).is_empty());
}

fn inline_module() -> Module {
    let mut module = Module::new("m");
    let mut inc = function(
        "inc",
        IrType::I32,
        &[IrType::I32],
        vec![block(0, vec![
            binary(1, IrBinaryOp::Add, Value::Temp(0), Value::Constant(1), IrType::I32),
            ret(Some(Value::Temp(1))),
        ])],
    );
    inc.linkage = Linkage::Internal;
    module.add_function(inc);
    module.add_function(function(
        "main",
        IrType::I32,
        &[],
        vec![block(0, vec![
            call(Some(0), "inc", vec![Value::Constant(41)], IrType::I32),
            ret(Some(Value::Temp(0))),
        ])],
    ));
    module
}

#[test]
fn test_optimizer_inlines_and_removes_local() {
    let mut module = inline_module();
    assert!(Optimizer::new(Vec::<String>::new()).run(&mut module));
    assert_eq!(body(&module, "main"), vec![ret(Some(Value::Constant(42)))]);
    assert!(module.get_function("inc").is_none());
}

#[test]
fn test_optimizer_inlines_nested_calls() {
    let mut module = Module::new("m");
    let mut id = function("id", IrType::I32, &[IrType::I32], vec![block(0, vec![ret(Some(Value::Temp(0)))])]);
    id.linkage = Linkage::Internal;
    module.add_function(id);
    module.add_function(function(
        "main",
        IrType::I32,
        &[],
        vec![block(0, vec![
            call(Some(0), "id", vec![Value::Constant(5)], IrType::I32),
            call(Some(1), "id", vec![Value::Temp(0)], IrType::I32),
            ret(Some(Value::Temp(1))),
        ])],
    ));

    assert!(Optimizer::new(["main"]).run(&mut module));
    assert_eq!(body(&module, "main"), vec![ret(Some(Value::Constant(5)))]);
    assert!(module.get_function("id").is_none());
    assert!(verify(&module).is_empty());
}

#[test]
fn test_optimizer_keeps_preserved_names() {
    let mut module = inline_module();
    Optimizer::new(["inc"]).run(&mut module);
    assert!(module.get_function("inc").is_some());
    assert_eq!(body(&module, "main")[0], call(Some(0), "inc", vec![Value::Constant(41)], IrType::I32));
}

#[test]
fn test_optimizer_removes_dead_arguments() {
    let mut module = Module::new("m");
    let mut g = function(
        "g",
        IrType::Void,
        &[IrType::I32, IrType::I32],
        vec![block(0, vec![call(None, "ext", vec![Value::Temp(0)], IrType::Void), ret(None)])],
    );
    g.linkage = Linkage::Internal;
    g.attributes.no_inline = true;
    module.add_function(g);
    module.add_function(Function::declaration("ext", IrType::Void, vec![IrType::I32]));
    module.add_function(function(
        "main",
        IrType::Void,
        &[],
        vec![block(0, vec![
            call(None, "g", vec![Value::Constant(1), Value::Constant(2)], IrType::Void),
            ret(None),
        ])],
    ));

    assert!(Optimizer::new(["main"]).run(&mut module));
    assert_eq!(module.get_function("g").unwrap().param_types(), vec![IrType::I32]);
    assert_eq!(
        body(&module, "main")[0],
        call(None, "g", vec![Value::Constant(1)], IrType::Void)
    );
    assert!(verify(&module).is_empty());
}

#[test]
fn test_optimizer_leaves_optnone_alone() {
    let mut module = Module::new("m");
    let mut f = function(
        "f",
        IrType::I32,
        &[],
        vec![block(0, vec![
            binary(0, IrBinaryOp::Add, Value::Constant(2), Value::Constant(3), IrType::I32),
            ret(Some(Value::Temp(0))),
        ])],
    );
    f.attributes.optimize_none = true;
    module.add_function(f);
    let before = module.clone();
    assert!(!Optimizer::new(Vec::<String>::new()).run(&mut module));
    assert_eq!(module, before);
}

#[test]
fn test_verifier_accepts_valid_module() {
    let module = inline_module();
    assert_eq!(verify(&module), Vec::<String>::new());
}

#[test]
fn test_verifier_reports_structural_errors() {
    let mut module = Module::new("m");
    module.add_function(function(
        "no_terminator",
        IrType::Void,
        &[],
        vec![block(0, vec![call(None, "missing", Vec::new(), IrType::Void)])],
    ));
    module.add_function(function(
        "bad_temp",
        IrType::I32,
        &[],
        vec![block(0, vec![ret(Some(Value::Temp(9)))])],
    ));
    module.add_function(function(
        "bad_arity",
        IrType::Void,
        &[],
        vec![block(0, vec![call(None, "bad_temp", vec![Value::Constant(1)], IrType::I32), ret(None)])],
    ));

    let errors = verify(&module);
    assert!(errors.iter().any(|e| e.contains("no_terminator: block 0 must end")));
    assert!(errors.iter().any(|e| e.contains("unknown function 'missing'")));
    assert!(errors.iter().any(|e| e.contains("undefined temporary %9")));
    assert!(errors.iter().any(|e| e.contains("call to 'bad_temp' passes 1 argument(s), expected 0")));
}

#[test]
fn test_verifier_reports_use_before_definition() {
    let mut module = Module::new("m");
    module.add_function(function(
        "f",
        IrType::I32,
        &[],
        vec![block(0, vec![
            binary(0, IrBinaryOp::Add, Value::Temp(1), Value::Constant(1), IrType::I32),
            binary(1, IrBinaryOp::Add, Value::Constant(1), Value::Constant(1), IrType::I32),
            ret(Some(Value::Temp(0))),
        ])],
    ));
    assert_eq!(verify(&module), vec!["f: %1 used before its definition".to_string()]);
}
