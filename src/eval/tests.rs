use super::*;
use crate::models::{Connection, Port, PortDirection, Resource};
use crate::symbolics::native::{Coefficient, Expr, NativeBackend};
use crate::symbolics::{FunctionError, Literal};

fn expr(text: &str) -> Expr {
    NativeBackend.parse(text).unwrap()
}

fn leaf(name: &str, params: &[&str], cost: &str) -> Routine<Expr> {
    Routine::new(name)
        .with_input_params(params.iter().copied())
        .with_port(Port::new("in_0", PortDirection::Input, expr(params[0])))
        .with_resource(Resource::additive("T_gates", expr(cost)))
}

fn sample() -> Routine<Expr> {
    Routine::new("root")
        .with_input_params(["x", "y"])
        .with_port(Port::new("in_0", PortDirection::Input, expr("x + y")))
        .with_resource(Resource::additive("T_gates", expr("x*y")))
        .with_child(leaf("a", &["x"], "3*x"))
        .with_child(leaf("b", &["y"], "y^2"))
}

fn sequential(backend: &NativeBackend) -> Evaluator<'_, NativeBackend> {
    Evaluator::new(backend).with_settings(EvaluationSettings {
        parallel: false,
        ..EvaluationSettings::default()
    })
}

// ============================================================================
// Substitution and parameter reduction
// ============================================================================

#[test]
fn test_assignment_reduces_input_params() {
    let result = evaluate(&sample(), [("x", 2)], &NativeBackend, None).unwrap();
    let root = &result.evaluated_routine;

    assert_eq!(root.input_params, vec!["y"]);
    assert_eq!(root.ports["in_0"].size, expr("y + 2"));
    assert_eq!(root.resources["T_gates"].value, expr("2*y"));
    assert!(root.children["a"].input_params.is_empty());
    assert_eq!(root.children["a"].resources["T_gates"].value, Expr::int(6));
    assert_eq!(root.children["b"].input_params, vec!["y"]);
    assert_eq!(root.children["b"].resources["T_gates"].value, expr("y^2"));
}

#[test]
fn test_input_routine_is_untouched() {
    let routine = sample();
    let before = routine.clone();
    let _ = evaluate(&routine, [("x", 2), ("y", 5)], &NativeBackend, None).unwrap();
    assert_eq!(routine, before);
}

#[test]
fn test_empty_assignment_is_identity() {
    let routine = sample();
    let result = evaluate(&routine, Vec::<(String, Literal)>::new(), &NativeBackend, None).unwrap();
    assert_eq!(result.evaluated_routine, routine);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let routine = sample();
    let result = evaluate(&routine, [("z", 7)], &NativeBackend, None).unwrap();
    assert_eq!(result.evaluated_routine, routine);
}

#[test]
fn test_symbolic_assignment() {
    let result = evaluate(&sample(), [("x", "k + 1")], &NativeBackend, None).unwrap();
    let root = &result.evaluated_routine;
    assert_eq!(root.input_params, vec!["y"]);
    assert!(NativeBackend.equals(&root.resources["T_gates"].value, &expr("k*y + y")));
    assert_eq!(root.children["a"].resources["T_gates"].value, expr("3*k + 3"));
}

#[test]
fn test_expression_assignment() {
    let assignments = [("y", Assignment::expr(expr("2*x")))];
    let result = evaluate(&sample(), assignments, &NativeBackend, None).unwrap();
    assert_eq!(result.evaluated_routine.resources["T_gates"].value, expr("2*x^2"));
}

#[test]
fn test_assignment_constants_are_resolved() {
    let result = evaluate(&sample(), [("x", "pi")], &NativeBackend, None).unwrap();
    let cost = &result.evaluated_routine.children["a"].resources["T_gates"].value;
    assert!(NativeBackend.equals(cost, &expr(&format!("{:?}", 3.0 * std::f64::consts::PI))));
}

#[test]
fn test_assignments_see_each_other() {
    let routine = Routine::new("root")
        .with_input_params(["x", "y"])
        .with_resource(Resource::additive("T_gates", expr("x + y")));

    let at_once = evaluate(&routine, [("x", "y"), ("y", "2")], &NativeBackend, None).unwrap();
    assert!(at_once.evaluated_routine.input_params.is_empty());
    assert_eq!(at_once.evaluated_routine.resources["T_gates"].value, Expr::int(4));

    let first = evaluate(&routine, [("x", "y")], &NativeBackend, None).unwrap();
    let stepwise = evaluate(&first.evaluated_routine, [("y", 2)], &NativeBackend, None).unwrap();
    assert_eq!(stepwise.evaluated_routine, at_once.evaluated_routine);
}

#[test]
fn test_assignment_chains_resolve_transitively() {
    let assignments = [("x", "2*y"), ("y", "z + 1"), ("z", "3")];
    let result = evaluate(&sample(), assignments, &NativeBackend, None).unwrap();
    assert_eq!(result.evaluated_routine.resources["T_gates"].value, Expr::int(32));
    assert_eq!(result.evaluated_routine.children["a"].resources["T_gates"].value, Expr::int(24));
}

#[test]
fn test_parallel_matches_sequential() {
    let backend = NativeBackend;
    let routine = sample();
    let parallel = Evaluator::new(&backend).evaluate(&routine, [("x", 3)]).unwrap();
    let serial = sequential(&backend).evaluate(&routine, [("x", 3)]).unwrap();
    assert_eq!(parallel.evaluated_routine, serial.evaluated_routine);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unparsable_assignment() {
    let err = evaluate(&sample(), [("x", "2 +* 3")], &NativeBackend, None).unwrap_err();
    assert!(matches!(
        err,
        Error::UnparsableAssignment { ref param, ref value, .. } if param == "x" && value == "2 +* 3"
    ));
}

#[test]
fn test_cyclic_assignments() {
    let err = evaluate(&sample(), [("x", "y + 1"), ("y", "x")], &NativeBackend, None).unwrap_err();
    assert_eq!(
        err,
        Error::CyclicAssignment {
            chain: vec!["x".to_string(), "y".to_string(), "x".to_string()],
        }
    );

    let err = evaluate(&sample(), [("x", "x + 1")], &NativeBackend, None).unwrap_err();
    assert_eq!(err.to_string(), "assignments refer to each other in a loop: x -> x");
}

#[test]
fn test_connection_loop_between_children_is_rejected() {
    let routine = sample()
        .with_connection(Connection::new("a.out", "b.in"))
        .with_connection(Connection::new("b.out", "a.in"));
    let err = evaluate(&routine, [("x", 1)], &NativeBackend, None).unwrap_err();
    assert!(matches!(err, Error::CyclicConnections { ref routine, .. } if routine == "root"));
}

#[test]
fn test_unresolved_function_in_closed_expression() {
    let routine = Routine::new("root")
        .with_input_params(["n"])
        .with_child(leaf("child", &["n"], "mystery(n) + 1"));

    let err = evaluate(&routine, [("n", 4)], &NativeBackend, None).unwrap_err();
    assert_eq!(
        err,
        Error::UnresolvedFunction {
            function: "mystery".to_string(),
            location: "root.child#resources.T_gates".to_string(),
        }
    );
}

#[test]
fn test_unresolved_function_with_free_symbols_is_legal() {
    let routine = leaf("root", &["n", "m"], "mystery(n) + m");
    let result = evaluate(&routine, [("n", 4)], &NativeBackend, None).unwrap();
    assert_eq!(result.evaluated_routine.resources["T_gates"].value, expr("mystery(4) + m"));
}

#[test]
fn test_untouched_closed_call_is_not_rejected() {
    let routine = Routine::new("root")
        .with_input_params(["n"])
        .with_resource(Resource::additive("overhead", expr("O(1)")))
        .with_resource(Resource::additive("T_gates", expr("4*n")));

    let unchanged = evaluate(&routine, Vec::<(String, Literal)>::new(), &NativeBackend, None).unwrap();
    assert_eq!(unchanged.evaluated_routine, routine);

    let bound = evaluate(&routine, [("n", 2)], &NativeBackend, None).unwrap();
    assert_eq!(bound.evaluated_routine.resources["overhead"].value, expr("O(1)"));
    assert_eq!(bound.evaluated_routine.resources["T_gates"].value, Expr::int(8));
}

#[test]
fn test_lenient_functions() {
    let backend = NativeBackend;
    let routine = leaf("root", &["n"], "mystery(n)");
    let result = Evaluator::new(&backend)
        .with_settings(EvaluationSettings {
            strict_functions: false,
            ..EvaluationSettings::default()
        })
        .evaluate(&routine, [("n", 4)])
        .unwrap();
    assert_eq!(result.evaluated_routine.resources["T_gates"].value, expr("mystery(4)"));
}

// ============================================================================
// Constraints
// ============================================================================

fn constrained() -> Routine<Expr> {
    Routine::new("root")
        .with_input_params(["N", "k"])
        .with_constraint(Constraint::new(expr("N"), expr("2^k")))
}

#[test]
fn test_constraint_stays_inconclusive_while_symbolic() {
    let result = evaluate(&constrained(), [("N", 8)], &NativeBackend, None).unwrap();
    let constraint = &result.evaluated_routine.constraints[0];
    assert_eq!(constraint.lhs, Expr::int(8));
    assert_eq!(constraint.rhs, expr("2^k"));
    assert_eq!(constraint.status, ConstraintStatus::Inconclusive);

    let settled = evaluate(&result.evaluated_routine, [("k", 3)], &NativeBackend, None).unwrap();
    assert_eq!(settled.evaluated_routine.constraints[0].status, ConstraintStatus::Satisfied);
}

#[test]
fn test_constraint_violation_is_recorded() {
    let result = evaluate(&constrained(), [("N", 8), ("k", 2)], &NativeBackend, None).unwrap();
    let constraint = &result.evaluated_routine.constraints[0];
    assert_eq!(constraint.status, ConstraintStatus::Violated);
    assert_eq!((constraint.lhs.clone(), constraint.rhs.clone()), (Expr::int(8), Expr::int(4)));
}

// ============================================================================
// Functions map
// ============================================================================

#[test]
fn test_functions_map_resolves_calls() {
    let functions = FunctionsMap::new().with("twice", |args: &[Expr]| match args {
        [Expr::Num(c)] => Ok(Expr::Num(c.mul(Coefficient::int(2)))),
        _ => Err(FunctionError::NoReduce),
    });
    let routine = leaf("root", &["n", "m"], "twice(n) + twice(m)");

    let partial = evaluate(&routine, [("n", 4)], &NativeBackend, Some(&functions)).unwrap();
    assert_eq!(
        partial.evaluated_routine.resources["T_gates"].value,
        expr("twice(m) + 8")
    );

    let full = evaluate(&routine, [("n", 4), ("m", 1)], &NativeBackend, Some(&functions)).unwrap();
    assert_eq!(full.evaluated_routine.resources["T_gates"].value, Expr::int(10));
}

#[test]
fn test_failing_function_reports_location() {
    let functions: FunctionsMap<Expr> = FunctionsMap::new()
        .with("broken", |_: &[Expr]| Err(FunctionError::Failed("no table entry".to_string())));
    let routine = leaf("root", &["n"], "broken(n)");

    let err = evaluate(&routine, [("n", 1)], &NativeBackend, Some(&functions)).unwrap_err();
    assert!(matches!(
        err,
        Error::FunctionEvaluation { ref location, .. } if location == "root#resources.T_gates"
    ));
}

// ============================================================================
// Result export
// ============================================================================

#[test]
fn test_result_to_schema() {
    let result = evaluate(&sample(), [("x", 2), ("y", 3)], &NativeBackend, None).unwrap();
    let schema = result.to_schema();
    assert!(schema.input_params.is_empty());
    assert_eq!(schema.resources[0].value, Literal::from("6"));
    assert_eq!(schema.children.len(), 2);
}
