//! End-to-end tests driving whole scripts through the library API.

use crate::language::lexer::lex;
use crate::language::names::NameTable;
use crate::language::parser::parse_program;
use crate::runtime::error::{FatalError, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::Value;
use pretty_assertions::assert_eq;

fn run(source: &str) -> Interpreter {
    let tokens = lex(source).expect("lex");
    let mut names = NameTable::new();
    let program = parse_program(&tokens, &mut names).expect("parse");
    let mut interp = Interpreter::new(names);
    interp.run(&program).expect("run");
    interp
}

fn run_err(source: &str) -> FatalError {
    let tokens = lex(source).expect("lex");
    let mut names = NameTable::new();
    let program = parse_program(&tokens, &mut names).expect("parse");
    let mut interp = Interpreter::new(names);
    interp.run(&program).expect_err("script should fail")
}

fn int_of(interp: &Interpreter, name: &str) -> i64 {
    let id = interp.lookup(name).expect("name is bound");
    interp.heap().expect_int(id).expect("int value")
}

fn bool_of(interp: &Interpreter, name: &str) -> bool {
    let id = interp.lookup(name).expect("name is bound");
    interp.heap().expect_bool(id).expect("bool value")
}

fn display_of(interp: &Interpreter, name: &str) -> String {
    let id = interp.lookup(name).expect("name is bound");
    interp.heap().display(id)
}

#[test]
fn arithmetic_and_promotion() {
    let interp = run("(set a (add 2 3)) (set b (mult a (sub 10 4))) (set c (add 1 0.5))");
    assert_eq!(int_of(&interp, "a"), 5);
    assert_eq!(int_of(&interp, "b"), 30);
    let c = interp.lookup("c").expect("bound");
    assert!(matches!(interp.heap().value(c), Some(Value::Real(v)) if *v == 1.5));
}

#[test]
fn integer_division_truncates() {
    let interp = run("(set q (div 7 2)) (set r (rem 7 2)) (set nq (div (neg 7) 2))");
    assert_eq!(int_of(&interp, "q"), 3);
    assert_eq!(int_of(&interp, "r"), 1);
    assert_eq!(int_of(&interp, "nq"), -3);
}

#[test]
fn division_by_zero_fails() {
    let err = run_err("(div 1 0)");
    assert_eq!(err.error, RuntimeError::DivisionByZero);
}

#[test]
fn while_loop_counts() {
    let interp = run("(set i 0) (while (lt i 3) ((set i (add i 1))))");
    assert_eq!(int_of(&interp, "i"), 3);
}

#[test]
fn for_loop_accumulates() {
    let interp = run("(set s 0) (for (set j 0) (lt j 4) (set j (add j 1)) ((set s (add s j))))");
    assert_eq!(int_of(&interp, "s"), 6);
    assert_eq!(int_of(&interp, "j"), 4);
}

#[test]
fn repeat_runs_body_before_condition() {
    let interp = run("(set i 0) (repeat ((set i (add i 1))) (ge i 3))");
    assert_eq!(int_of(&interp, "i"), 3);
    // Body runs at least once even when the condition starts true.
    let interp = run("(set n 0) (repeat ((set n (add n 1))) true)");
    assert_eq!(int_of(&interp, "n"), 1);
}

#[test]
fn break_and_continue() {
    let interp = run(
        "(set i 0) (set n 0) \
         (while (lt i 10) ( \
            (set i (add i 1)) \
            (if (eq i 3) (continue) ()) \
            (if (gt i 5) (break) ()) \
            (set n (add n 1))))",
    );
    assert_eq!(int_of(&interp, "i"), 6);
    assert_eq!(int_of(&interp, "n"), 4);
}

#[test]
fn if_discards_its_branch_value() {
    let err = run_err("(set x (if true 1 2))");
    assert_eq!(err.error, RuntimeError::MissingValue);
}

#[test]
fn functions_return_values() {
    let interp = run("(set f (func (return 42))) (set r (call f))");
    assert_eq!(int_of(&interp, "r"), 42);
}

#[test]
fn function_body_last_value_is_returned() {
    let interp = run("(set f (func ((set t 1) (add t 41)))) (set r (call f))");
    assert_eq!(int_of(&interp, "r"), 42);
}

#[test]
fn arg_zero_is_the_first_written_argument() {
    let interp = run(
        "(set first (func (arg 0))) (set second (func (arg 1))) \
         (set a (call first 10 20)) (set b (call second 10 20))",
    );
    assert_eq!(int_of(&interp, "a"), 10);
    assert_eq!(int_of(&interp, "b"), 20);
}

#[test]
fn arg_out_of_range_fails() {
    let err = run_err("(set f (func (arg 0))) (call f)");
    assert_eq!(err.error, RuntimeError::StackAccess { pos: 0 });
}

#[test]
fn call_frames_see_globals_but_not_intermediate_frames() {
    let interp = run("(set g 7) (set f (func (return g))) (set r (call f))");
    assert_eq!(int_of(&interp, "r"), 7);

    let err = run_err(
        "(set f (func (return x))) \
         (if true ((set x 5) (set r (call f))) ())",
    );
    assert_eq!(
        err.error,
        RuntimeError::NameResolution { name: "x".into() }
    );
}

#[test]
fn arguments_reach_nested_loop_frames() {
    let interp = run(
        "(set f (func ( \
            (set total 0) \
            (set i 0) \
            (while (lt i (arg 1)) ( \
                (set total (add total (arg 0))) \
                (set i (add i 1)))) \
            (return total)))) \
         (set r (call f 5 3))",
    );
    assert_eq!(int_of(&interp, "r"), 15);
}

#[test]
fn recursion_works() {
    let interp = run(
        "(set fact (func ( \
            (if (le (arg 0) 1) ((return 1)) ()) \
            (return (mult (arg 0) (call fact (sub (arg 0) 1))))))) \
         (set r (call fact 6))",
    );
    assert_eq!(int_of(&interp, "r"), 720);
}

#[test]
fn bindings_inside_functions_do_not_leak() {
    let err = run_err("(set f (func (set hidden 1))) (call f) (set x hidden)");
    assert_eq!(
        err.error,
        RuntimeError::NameResolution {
            name: "hidden".into()
        }
    );
}

#[test]
fn set_rebinds_where_the_name_was_found() {
    let interp = run("(set x 1) (if true ((set x 2)) ())");
    assert_eq!(int_of(&interp, "x"), 2);
}

#[test]
fn fresh_names_bind_in_the_current_frame() {
    let err = run_err("(if true ((set y 1)) ()) (set z y)");
    assert_eq!(err.error, RuntimeError::NameResolution { name: "y".into() });
}

#[test]
fn function_values_compare_by_identity() {
    let interp = run(
        "(set f (func (return 1))) (set g f) (set h (func (return 1))) \
         (set same (eq f g)) (set diff (eq f h))",
    );
    assert!(bool_of(&interp, "same"));
    assert!(!bool_of(&interp, "diff"));
}

#[test]
fn dict_insert_access_present_remove() {
    let interp = run(
        "(set d {}) \
         ([d+] d \"a\" 1) \
         (set p ([d?] d \"a\")) \
         (set v ([d] d \"a\")) \
         (set n ([dn] d)) \
         ([d-] d \"a\") \
         (set q ([d?] d \"a\"))",
    );
    assert!(bool_of(&interp, "p"));
    assert_eq!(int_of(&interp, "v"), 1);
    assert_eq!(int_of(&interp, "n"), 1);
    assert!(!bool_of(&interp, "q"));
}

#[test]
fn dict_values_are_copies() {
    let interp = run(
        "(set d {}) (set v 1) \
         ([d+] d \"k\" v) \
         (set v 2) \
         (set stored ([d] d \"k\"))",
    );
    assert_eq!(int_of(&interp, "stored"), 1);
    assert_eq!(int_of(&interp, "v"), 2);
}

#[test]
fn dict_keys_of_mixed_kinds() {
    let interp = run(
        "(set d {}) \
         ([d+] d 1 \"int key\") \
         ([d+] d \"1\" \"string key\") \
         ([d+] d 'x' \"char key\") \
         (set n ([dn] d)) \
         (set v ([d] d \"1\"))",
    );
    assert_eq!(int_of(&interp, "n"), 3);
    assert_eq!(display_of(&interp, "v"), "string key");
}

#[test]
fn dict_keys_and_values_snapshots() {
    let interp = run(
        "(set d {}) ([d+] d \"a\" 1) ([d+] d \"b\" 2) \
         (set k ([dk] d)) (set v ([dv] d)) \
         (set nk ([dn] k)) (set nv ([dn] v)) \
         (set k0 ([d] k 0)) (set k1 ([d] k 1))",
    );
    assert_eq!(int_of(&interp, "nk"), 2);
    assert_eq!(int_of(&interp, "nv"), 2);
    let mut keys = vec![display_of(&interp, "k0"), display_of(&interp, "k1")];
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn dict_clear_empties() {
    let interp = run("(set d {}) ([d+] d 1 2) ([dc] d) (set n ([dn] d))");
    assert_eq!(int_of(&interp, "n"), 0);
}

#[test]
fn dicts_compare_structurally() {
    let interp = run(
        "(set a {}) (set b {}) \
         ([d+] a \"x\" 1) ([d+] a \"y\" 2) \
         ([d+] b \"y\" 2) ([d+] b \"x\" 1) \
         (set same (eq a b)) \
         ([d+] b \"x\" 9) \
         (set diff (eq a b))",
    );
    assert!(bool_of(&interp, "same"));
    assert!(!bool_of(&interp, "diff"));
}

#[test]
fn dict_inserted_into_itself_is_a_snapshot() {
    let interp = run(
        "(set d {}) ([d+] d \"n\" 1) \
         ([d+] d \"self\" d) \
         (set inner ([d] d \"self\")) \
         (set n ([dn] inner)) \
         (set v ([d] inner \"n\"))",
    );
    assert_eq!(int_of(&interp, "n"), 1);
    assert_eq!(int_of(&interp, "v"), 1);
}

#[test]
fn dict_receiver_must_be_referenceable() {
    let err = run_err("([d+] {} 1 2)");
    assert_eq!(err.error, RuntimeError::NotReferenceable);
}

#[test]
fn dict_remove_of_absent_key_is_a_noop() {
    let interp = run(
        "(set d {}) \
         ([d-] d \"missing\") \
         ([d+] d \"a\" 1) \
         ([d-] d \"also missing\") \
         (set n ([dn] d))",
    );
    assert_eq!(int_of(&interp, "n"), 1);
}

#[test]
fn dict_missing_key_fails() {
    let err = run_err("(set d {}) ([d] d 1)");
    assert_eq!(err.error, RuntimeError::KeyNotFound);
}

#[test]
fn string_operations() {
    let interp = run(
        "(set s \"hello\") \
         (set c ([s] s 1)) \
         (set n ([sn] s)) \
         ([s+] s \"!\") \
         ([-s] s 1) \
         ([+s] s \">\") \
         ([s-] s 2)",
    );
    assert_eq!(display_of(&interp, "c"), "e");
    assert_eq!(int_of(&interp, "n"), 5);
    assert_eq!(display_of(&interp, "s"), ">ell");
}

#[test]
fn string_index_out_of_range() {
    let err = run_err("(set s \"ab\") ([s] s 5)");
    assert_eq!(err.error, RuntimeError::Bounds { index: 5, len: 2 });
}

#[test]
fn casts() {
    let interp = run(
        "(set i (int \"42\")) \
         (set r (real 3)) \
         (set b (bool 0)) \
         (set c (char 97)) \
         (set s (string 1.5)) \
         (set t (string true))",
    );
    assert_eq!(int_of(&interp, "i"), 42);
    assert_eq!(display_of(&interp, "r"), "3.0");
    assert!(!bool_of(&interp, "b"));
    assert_eq!(display_of(&interp, "c"), "a");
    assert_eq!(display_of(&interp, "s"), "1.5");
    assert_eq!(display_of(&interp, "t"), "true");
}

#[test]
fn unparsable_numeric_cast_fails() {
    let err = run_err("(int \"abc\")");
    assert_eq!(
        err.error,
        RuntimeError::Conversion {
            target: "int",
            text: "abc".into()
        }
    );
}

#[test]
fn pointers_alias_their_target() {
    let interp = run("(set x 5) (set p (ref x)) (set (deref p) 9) (set y (deref p))");
    assert_eq!(int_of(&interp, "x"), 9);
    assert_eq!(int_of(&interp, "y"), 9);
}

#[test]
fn null_deref_fails() {
    let err = run_err("(deref NULL)");
    assert_eq!(err.error, RuntimeError::NullDereference);
}

#[test]
fn dangling_deref_fails() {
    let err = run_err(
        "(set p NULL) \
         (if true ((set x 1) (set p (ref x))) ()) \
         (set y (deref p))",
    );
    assert_eq!(err.error, RuntimeError::DanglingPointer);
}

#[test]
fn equality_across_kinds_is_false() {
    let interp = run("(set a (eq 1 \"1\")) (set b (eq 1 1.0)) (set c (neq 'a' \"a\"))");
    assert!(!bool_of(&interp, "a"));
    assert!(!bool_of(&interp, "b"));
    assert!(bool_of(&interp, "c"));
}

#[test]
fn comparisons_and_logic() {
    let interp = run(
        "(set a (lt 1 2)) (set b (ge 2 2)) (set c (gt 1.5 1)) \
         (set d (conj true false)) (set e (disj true false)) \
         (set f (not false)) (set g (xor 12 10)) (set h (shl 1 4))",
    );
    assert!(bool_of(&interp, "a"));
    assert!(bool_of(&interp, "b"));
    assert!(bool_of(&interp, "c"));
    assert!(!bool_of(&interp, "d"));
    assert!(bool_of(&interp, "e"));
    assert!(bool_of(&interp, "f"));
    assert_eq!(int_of(&interp, "g"), 6);
    assert_eq!(int_of(&interp, "h"), 16);
}

#[test]
fn type_mismatch_reports_kinds() {
    let err = run_err("(add 1 \"x\")");
    assert_eq!(
        err.error,
        RuntimeError::Type {
            expected: "int or real",
            found: "string"
        }
    );
}

#[test]
fn condition_must_be_bool() {
    let err = run_err("(while 1 ())");
    assert_eq!(
        err.error,
        RuntimeError::Type {
            expected: "bool",
            found: "int"
        }
    );
}

#[test]
fn stock_natives() {
    let interp = run(
        "(set a (call abs (neg 5))) \
         (set z (call sin 0)) \
         (set r (call randint 10)) \
         (set t (call gettimems))",
    );
    assert_eq!(int_of(&interp, "a"), 5);
    assert_eq!(display_of(&interp, "z"), "0.0");
    let r = int_of(&interp, "r");
    assert!((0..=10).contains(&r));
    assert!(int_of(&interp, "t") > 0);
}

#[test]
fn print_natives_produce_no_value() {
    let err = run_err("(set x (call println \"output\" 1 true))");
    // The call succeeds and writes; binding its absent result is the error.
    assert_eq!(err.error, RuntimeError::MissingValue);
}

#[test]
fn failed_assert_is_fatal() {
    let err = run_err("(call assert (eq 1 2) \"numbers diverge\")");
    assert_eq!(
        err.error,
        RuntimeError::Native {
            message: "assertion failed: numbers diverge".into()
        }
    );
}

#[test]
fn install_native_extends_the_runtime() {
    use crate::runtime::error::RuntimeResult;
    use crate::runtime::value::ObjId;

    fn double(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
        let v = interp.heap().expect_int(interp.native_arg(0)?)?;
        Ok(Some(interp.alloc_result(Value::Int(v * 2))))
    }

    let tokens = lex("(set r (call double 21))").expect("lex");
    let mut names = NameTable::new();
    let program = parse_program(&tokens, &mut names).expect("parse");
    let mut interp = Interpreter::new(names);
    interp.install_native("double", double);
    interp.run(&program).expect("run");
    assert_eq!(int_of(&interp, "r"), 42);
}

#[test]
fn call_result_is_usable_as_operand() {
    let interp = run("(set f (func (return 20))) (set r (add (call f) (call f)))");
    assert_eq!(int_of(&interp, "r"), 40);
}

#[test]
fn heap_stays_bounded_across_many_statements() {
    let interp = run(
        "(set total 0) \
         (set i 0) \
         (while (lt i 200) ( \
            (set s \"x\") \
            ([s+] s \"y\") \
            (set total (add total ([sn] s))) \
            (set i (add i 1))))",
    );
    assert_eq!(int_of(&interp, "total"), 400);
    assert!(interp.heap().live_count() < 40);
}
