//! Semantic analysis: what the rewriting pass does to the tree, and which
//! diagnostics it emits where.

use dinterp::ast::{Body, ExprKind, StmtKind};
use dinterp::{AccumulatingLog, DiagCode, Runner, Severity, SourceFile, Value, analyze};
use pretty_assertions::assert_eq;

fn compile(code: &str) -> (Runner, AccumulatingLog) {
    let mut log = AccumulatingLog::new();
    let runner = Runner::compile(code, "test.d", &mut log).unwrap_or_else(|| {
        panic!(
            "expected the program to compile; log:\n{}",
            log.render(Severity::Info, &SourceFile::new("test.d", code), &dinterp::FormatOptions::default())
        )
    });
    (runner, log)
}

fn compile_fail(code: &str) -> AccumulatingLog {
    let mut log = AccumulatingLog::new();
    assert!(
        Runner::compile(code, "test.d", &mut log).is_none(),
        "expected compilation to fail"
    );
    log
}

fn has_code(log: &AccumulatingLog, code: DiagCode) -> bool {
    log.messages().iter().any(|m| m.code == code)
}

/// Asserts a message with `code` covers the 0-based (line, col) position.
fn expect_at(log: &AccumulatingLog, source: &str, code: DiagCode, line: usize, col: usize) {
    let file = SourceFile::new("test.d", source);
    let pos = file.position(line, col);
    let found = log.messages().iter().any(|m| {
        m.code == code && m.spans.iter().any(|s| s.start <= pos && pos < s.end.max(s.start + 1))
    });
    assert!(
        found,
        "expected ({code}) covering {}:{col}; log:\n{}",
        line + 1,
        log.render(Severity::Info, &file, &dinterp::FormatOptions::default())
    );
}

// === Folding & rewriting ===

#[test]
fn known_pure_expressions_fold_to_literals() {
    let (runner, _) = compile("var x := 2 + 3 * 4\nprint x");
    let StmtKind::Print(exprs) = &runner.program().statements[1].kind else {
        panic!("second statement stays a print");
    };
    let ExprKind::Literal(Value::Int(v)) = &exprs[0].kind else {
        panic!("the print argument folded: {:?}", exprs[0].kind);
    };
    assert_eq!(v.to_string(), "14");
}

#[test]
fn mixed_sums_keep_residual_operands() {
    let code = "\
var c := input()
print \"http://\" + c + \".com/\"
";
    let (runner, _) = compile(code);
    let StmtKind::Print(exprs) = &runner.program().statements[1].kind else {
        panic!("print");
    };
    let ExprKind::Sum { terms, .. } = &exprs[0].kind else {
        panic!("residual sum survives: {:?}", exprs[0].kind);
    };
    // Non-numeric chains only merge adjacent known operands, so all three
    // terms survive.
    assert_eq!(terms.len(), 3);
}

#[test]
fn numeric_sums_collect_around_unknowns() {
    let code = "\
var a := [input()]
print 2 + a[1].Length + 3
";
    let (runner, _) = compile(code);
    let StmtKind::Print(exprs) = &runner.program().statements[1].kind else {
        panic!("print");
    };
    let ExprKind::Sum { terms, .. } = &exprs[0].kind else {
        panic!("residual sum survives: {:?}", exprs[0].kind);
    };
    assert_eq!(terms.len(), 2, "2 and 3 collect into one literal");
    let ExprKind::Literal(Value::Int(v)) = &terms[0].kind else {
        panic!("the folded literal leads the chain: {:?}", terms[0].kind);
    };
    assert_eq!(v.to_string(), "5");
}

#[test]
fn statically_true_if_keeps_only_the_live_branch() {
    let (runner, log) = compile("if true then print \"a\" else print \"b\" end");
    assert!(has_code(&log, DiagCode::IfConditionAlwaysKnown));
    assert_eq!(runner.program().statements.len(), 1);
    let StmtKind::Block(body) = &runner.program().statements[0].kind else {
        panic!("the live branch is spliced in as a block");
    };
    assert_eq!(body.statements.len(), 1);
    assert!(matches!(body.statements[0].kind, StmtKind::Print(_)));
}

#[test]
fn false_while_loops_are_removed() {
    let (runner, log) = compile("while false loop print 1 end");
    assert!(has_code(&log, DiagCode::WhileConditionFalseAtStart));
    assert!(runner.program().statements.is_empty());
}

#[test]
fn pure_expression_statements_are_removed() {
    let (runner, log) = compile("1 + 2\nprint 3");
    assert!(has_code(&log, DiagCode::ExpressionStatementNoSideEffects));
    assert_eq!(runner.program().statements.len(), 1);
    assert!(matches!(runner.program().statements[0].kind, StmtKind::Print(_)));
}

#[test]
fn code_after_return_is_pruned() {
    let code = "\
var f := func() is
    return 1
    print 2
end
f()
";
    let (runner, log) = compile(code);
    assert!(has_code(&log, DiagCode::CodeUnreachable));
    let StmtKind::Var(defs) = &runner.program().statements[0].kind else {
        panic!("var statement");
    };
    let Some(init) = &defs[0].init else { panic!("has an initializer") };
    let ExprKind::Closure(def) = &init.kind else {
        panic!("func literal became a closure definition");
    };
    let dinterp::ast::FuncBody::Long(body) = &*def.body else {
        panic!("long body");
    };
    assert_eq!(body.statements.len(), 1, "the print after return is gone");
}

#[test]
fn closure_definitions_record_captured_externals() {
    let code = "\
var flag := true
var f := func() is
    if flag then print \"on\" end
end
f()
";
    let (runner, _) = compile(code);
    let StmtKind::Var(defs) = &runner.program().statements[1].kind else {
        panic!("var statement");
    };
    let ExprKind::Closure(def) = &defs[0].init.as_ref().expect("initialized").kind else {
        panic!("closure definition");
    };
    assert_eq!(def.captured, vec!["flag".to_owned()]);
    assert!(def.params.is_empty());
    assert!(!def.func_type.pure, "printing makes the body impure");
    assert_eq!(def.func_type.ret, dinterp::DType::None);
}

#[test]
fn statically_false_relation_chains_collapse() {
    let (runner, log) = compile("print 3 < 2 < 9");
    assert!(has_code(&log, DiagCode::CodeUnreachable));
    let StmtKind::Print(exprs) = &runner.program().statements[0].kind else {
        panic!("print");
    };
    assert!(matches!(exprs[0].kind, ExprKind::Literal(Value::Bool(false))));
}

#[test]
fn xor_compacts_known_operands() {
    let code = "\
var x := input() = \"y\"
print true xor false xor x
";
    let (runner, _) = compile(code);
    let StmtKind::Print(exprs) = &runner.program().statements[1].kind else {
        panic!("print");
    };
    let ExprKind::Xor(operands) = &exprs[0].kind else {
        panic!("xor survives: {:?}", exprs[0].kind);
    };
    assert_eq!(operands.len(), 2);
    assert!(matches!(operands[0].kind, ExprKind::Literal(Value::Bool(true))));
}

#[test]
fn decisive_or_operand_cuts_the_tail() {
    let code = "\
var x := input() = \"y\"
print true or x
";
    let (runner, log) = compile(code);
    assert!(has_code(&log, DiagCode::CodeUnreachable));
    let StmtKind::Print(exprs) = &runner.program().statements[1].kind else {
        panic!("print");
    };
    assert!(matches!(exprs[0].kind, ExprKind::Literal(Value::Bool(true))));
}

#[test]
fn analysis_is_idempotent() {
    let code = "\
var x := 2 + 3
print x
var c := input() = \"y\"
if c then print \"a\" else print \"b\" end
while c loop print 1; exit end
";
    let (runner, _) = compile(code);
    let mut again: Body = runner.program().clone();
    let mut log = AccumulatingLog::new();
    assert!(analyze(&mut again, &mut log));
    assert_eq!(&again, runner.program());
}

// === Warnings ===

#[test]
fn unused_variable_warnings() {
    let (_, log) = compile("var x\nprint 1");
    assert!(has_code(&log, DiagCode::VariableNeverUsed));

    let code = "var y := 1\nprint y\ny := 2\n";
    let (_, log) = compile(code);
    expect_at(&log, code, DiagCode::AssignedValueUnused, 2, 0);
}

#[test]
fn integer_zero_division_warning_on_unknown_dividend() {
    let code = "\
var n := input().Length
print n / 0
";
    let (_, log) = compile(code);
    expect_at(&log, code, DiagCode::IntegerZeroDivisionWarning, 1, 10);
}

#[test]
fn warnings_do_not_gate_compilation() {
    let (runner, log) = compile("var x\nprint 1");
    assert!(!log.messages().is_empty());
    assert_eq!(runner.run_collect(&[]).expect("runs"), "1");
}

// === Errors ===

#[test]
fn literal_zero_division_is_a_compile_error() {
    let log = compile_fail("print 10 / 0");
    assert!(has_code(&log, DiagCode::EvaluationException));
}

#[test]
fn reading_a_none_value_is_an_error() {
    let log = compile_fail("var x\nprint x");
    assert!(has_code(&log, DiagCode::NoneValueAccessed));
}

#[test]
fn undefined_and_redefined_variables() {
    let code = "print y";
    let log = compile_fail(code);
    expect_at(&log, code, DiagCode::VariableNotDefined, 0, 6);

    let log = compile_fail("var x := 1\nvar x := 2");
    assert!(has_code(&log, DiagCode::VariableRedefined));
}

#[test]
fn operator_type_errors() {
    let log = compile_fail("print \"a\" - \"b\"");
    assert!(has_code(&log, DiagCode::OperatorNotApplicable));

    let log = compile_fail("print 1 and true");
    assert!(has_code(&log, DiagCode::OperatorNotApplicable));

    let log = compile_fail("print 1 xor 2");
    assert!(has_code(&log, DiagCode::OperatorNotApplicable));

    let log = compile_fail("print true = false");
    assert!(has_code(&log, DiagCode::OperatorNotApplicable));
}

#[test]
fn call_shape_errors() {
    let log = compile_fail("var f := func(a) => a\nf(1, 2)");
    assert!(has_code(&log, DiagCode::WrongArgumentCount));

    let log = compile_fail("print \"abc\".Slice(1, 2, \"x\")");
    assert!(has_code(&log, DiagCode::WrongArgumentType));

    let log = compile_fail("var x := 1\nx()");
    assert!(has_code(&log, DiagCode::TriedToCallNonFunction));
}

#[test]
fn condition_and_loop_typing_errors() {
    let log = compile_fail("if 1 then print 1 end");
    assert!(has_code(&log, DiagCode::ConditionMustBeBoolean));

    let log = compile_fail("while 5 loop end");
    assert!(has_code(&log, DiagCode::WhileConditionNotBoolAtStart));

    let log = compile_fail("for x in 5 loop end");
    assert!(has_code(&log, DiagCode::IterableExpected));

    let log = compile_fail("for i in \"a\"..\"b\" loop print i end");
    assert!(has_code(&log, DiagCode::IntegerBoundaryExpected));
}

#[test]
fn field_and_subscript_errors() {
    let log = compile_fail("print 5.Q");
    assert!(has_code(&log, DiagCode::NoSuchField));

    let log = compile_fail("var a := [1]\na[\"x\"] := 2");
    assert!(has_code(&log, DiagCode::BadSubscriptIndexType));

    let log = compile_fail("var t := {x := 1}\nt[1] := 2");
    assert!(has_code(&log, DiagCode::SubscriptAssignmentOnlyInArrays));

    let log = compile_fail("var a := [1]\na.x := 2");
    assert!(has_code(&log, DiagCode::FieldsOnlyAssignableInTuples));
}

#[test]
fn placement_errors() {
    let log = compile_fail("exit");
    assert!(has_code(&log, DiagCode::ExitOutsideOfCycle));

    let log = compile_fail("return 1");
    assert!(has_code(&log, DiagCode::ReturnOutsideOfFunction));
}

#[test]
fn duplicate_name_errors() {
    let log = compile_fail("print {a := 1, a := 2}");
    assert!(has_code(&log, DiagCode::DuplicateFieldNames));

    let log = compile_fail("var f := func(a, a) => a\nf(1, 1)");
    assert!(has_code(&log, DiagCode::DuplicateParameterNames));
}

#[test]
fn parser_reports_the_rightmost_failure() {
    let log = compile_fail("var := 3");
    assert!(has_code(&log, DiagCode::UnexpectedToken));
}

#[test]
fn lexer_errors_reach_the_log() {
    let log = compile_fail("print 1 @");
    assert!(has_code(&log, DiagCode::UnknownCharacter));
}
