use std::fs;

use pretty_assertions::assert_eq;

use crate::bytecode::{ByteCode, Opcode, Operand};
use crate::compiler::Compiler;
use crate::config::{Settings, Strictness};
use crate::error::{ErrorKind, Result};
use crate::runtime::Runtime;

fn compile(source: &str) -> Result<ByteCode> {
    Compiler::new("test", &Settings::default()).compile(source)
}

fn compile_error(source: &str) -> ErrorKind {
    compile(source).unwrap_err().kind
}

fn ops(code: &ByteCode) -> Vec<Opcode> {
    code.instructions().iter().map(|i| i.op).collect()
}

fn run(source: &str) -> String {
    let (runtime, output) = Runtime::with_capture();
    runtime.run("test", source).unwrap();
    output.contents()
}

#[test]
fn test_expression_precedence() {
    let mut compiler = Compiler::new("expr", &Settings::default());
    let code = compiler.compile_expression("1 + 2 * 3").unwrap();
    assert_eq!(
        ops(&code),
        vec![
            Opcode::AtLine,
            Opcode::Push,
            Opcode::Push,
            Opcode::Push,
            Opcode::Mul,
            Opcode::Add
        ]
    );
    assert!(code.is_sealed());
}

#[test]
fn test_trailing_tokens_rejected_in_expression() {
    let mut compiler = Compiler::new("expr", &Settings::default());
    let err = compiler.compile_expression("1 + 2 )").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedToken);
}

#[test]
fn test_statements_on_one_line_need_separator() {
    let err = compile("x := 5; print x<-1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    assert_eq!(err.line, 1);
    assert_eq!(compile_error("x := 1 y := 2"), ErrorKind::UnexpectedToken);
    assert!(compile("x := 1; y := 2\nprint x\nprint y").is_ok());
}

#[test]
fn test_compile_errors() {
    assert_eq!(compile_error("x := 1\nx := 2"), ErrorKind::DuplicateDeclaration);
    assert_eq!(compile_error("break"), ErrorKind::InvalidLoopControl);
    assert_eq!(compile_error("try { print 1 }"), ErrorKind::MissingCatch);
    assert_eq!(compile_error("func f() int"), ErrorKind::MissingFunctionBody);
    assert_eq!(compile_error("x := 1\nconst y = x + 1"), ErrorKind::InvalidConstant);
    assert_eq!(compile_error("var x blob"), ErrorKind::InvalidTypeSpec);
    assert_eq!(compile_error("@frobnicate 3"), ErrorKind::InvalidDirective);
    assert_eq!(compile_error("var for int"), ErrorKind::ReservedWord);
    assert_eq!(compile_error("print (1"), ErrorKind::Missing(")"));
    assert_eq!(compile_error("import \"nowhere\""), ErrorKind::PackageNotFound);
    assert_eq!(compile_error("func f() int { return 1, 2 }"), ErrorKind::InvalidReturn);
}

#[test]
fn test_error_position() {
    let err = compile("x := 1\ny := (x +\n").unwrap_err();
    assert_eq!(err.module.as_deref(), Some("test"));
    assert_eq!(err.line, 2);
}

#[test]
fn test_function_declaration_recorded() {
    let code = compile("func add(a, b int, rest ...float64) (int, error) { return a, nil }").unwrap();
    let Some(Operand::Value(crate::value::Value::Function(func))) =
        code.instructions().iter().find(|i| i.op == Opcode::Push).map(|i| &i.operand)
    else {
        panic!("no function pushed");
    };
    let declaration = func.code.declaration.as_ref().unwrap();
    assert_eq!(declaration.name, "add");
    assert_eq!(declaration.parameters.len(), 3);
    assert_eq!(declaration.parameters[0].kind.to_string(), "int");
    assert!(declaration.variadic);
    assert_eq!(declaration.min_args(), 2);
    assert_eq!(declaration.returns.len(), 2);
}

#[test]
fn test_package_main_detected() {
    let mut compiler = Compiler::new("prog", &Settings::default());
    compiler.compile("package main\nfunc main() { print 1 }").unwrap();
    assert_eq!(compiler.package(), Some("main"));
    assert!(compiler.has_main());
}

#[test]
fn test_type_directive_changes_strictness() {
    let mut compiler = Compiler::new("prog", &Settings::default());
    let code = compiler.compile("@type strict").unwrap();
    assert_eq!(compiler.strictness(), Strictness::Strict);
    assert_eq!(ops(&code), vec![Opcode::AtLine, Opcode::StaticTyping]);
}

#[test]
fn test_branches_are_patched() {
    let code = compile("x := 0\nif x > 1 { x = 1 } else { x = 2 }").unwrap();
    for instruction in code.instructions() {
        if instruction.op.is_branch() {
            let target = instruction.operand.as_address().unwrap();
            assert!(target > 0 && target <= code.len(), "{}", instruction);
        }
    }
}

#[test]
fn test_if_else_chain() {
    let source = "for _, n := range []int{1, 5, 12} {\n\
                  if n < 3 {\n print \"small\"\n\
                  } else if n < 10 {\n print \"medium\"\n\
                  } else {\n print \"large\"\n }\n\
                  }";
    assert_eq!(run(source), "small\nmedium\nlarge\n");
}

#[test]
fn test_if_with_init_statement() {
    let source = "if n := 4; n % 2 == 0 { print \"even\", n }";
    assert_eq!(run(source), "even 4\n");
}

#[test]
fn test_loop_forms() {
    let source = "i := 0\n\
                  for i < 3 { i++ }\n\
                  print i\n\
                  n := 0\n\
                  for {\n n += 2\n if n > 7 { break }\n }\n\
                  print n\n\
                  total := 0\n\
                  for j := 0; j < 10; j++ {\n\
                  if j % 2 == 1 { continue }\n\
                  total += j\n\
                  }\n\
                  print total";
    assert_eq!(run(source), "3\n8\n20\n");
}

#[test]
fn test_break_from_nested_blocks() {
    let source = "count := 0\n\
                  for i := 0; i < 5; i++ {\n\
                  for j := 0; j < 5; j++ {\n\
                  if j == 2 { break }\n\
                  count++\n\
                  }\n\
                  }\n\
                  print count";
    assert_eq!(run(source), "10\n");
}

#[test]
fn test_range_forms() {
    let source = "m := map[string]int{\"b\": 2, \"a\": 1}\n\
                  for k, v := range m { print k, v }\n\
                  sum := 0\n\
                  for i := range 4 { sum += i }\n\
                  print sum\n\
                  for i := range \"hi\" { print i }";
    assert_eq!(run(source), "a 1\nb 2\n6\n0\n1\n");
}

#[test]
fn test_switch_statement() {
    let source = "func name(n int) string {\n\
                  switch n {\n\
                  case 1:\n return \"one\"\n\
                  case 2, 3:\n return \"few\"\n\
                  default:\n return \"many\"\n\
                  }\n\
                  return \"\"\n\
                  }\n\
                  print name(1), name(3), name(9)\n\
                  x := 5\n\
                  switch {\n\
                  case x > 3:\n print \"big\"\n fallthrough\n\
                  case x > 100:\n print \"fell\"\n\
                  case x > 1:\n print \"skipped\"\n\
                  }";
    assert_eq!(run(source), "one few many\nbig\nfell\n");
}

#[test]
fn test_switch_default_first() {
    let source = "for _, n := range []int{1, 7} {\n\
                  switch n {\n\
                  default:\n print \"other\"\n\
                  case 1:\n print \"one\"\n\
                  }\n\
                  }";
    assert_eq!(run(source), "one\nother\n");
}

#[test]
fn test_break_inside_switch_leaves_switch() {
    let source = "for i := 0; i < 3; i++ {\n\
                  switch i {\n\
                  case 1:\n break\n\
                  }\n\
                  print i\n\
                  }";
    assert_eq!(run(source), "0\n1\n2\n");
}

#[test]
fn test_closures_share_captured_variable() {
    let source = "func counter() func() int {\n\
                  n := 0\n\
                  return func() int {\n n++\n return n\n }\n\
                  }\n\
                  c := counter()\n\
                  c()\n\
                  print c()\n\
                  d := counter()\n\
                  print d()";
    assert_eq!(run(source), "2\n1\n");
}

#[test]
fn test_struct_types_and_methods() {
    let source = "type Point struct { x, y int }\n\
                  func (p Point) sum() int { return p.x + p.y }\n\
                  func (p *Point) move(dx int) { p.x += dx }\n\
                  p := Point{x: 1, y: 2}\n\
                  p.move(10)\n\
                  print p.sum(), p\n\
                  q := Point{3, 4}\n\
                  print q.x, q.y";
    assert_eq!(run(source), "13 {x: 11, y: 2}\n3 4\n");
}

#[test]
fn test_receiver_binding_form() {
    let source = "type Box struct { v int }\n\
                  Box.get = func ->b () int { return b.v * 2 }\n\
                  x := Box{v: 21}\n\
                  print x->get()";
    assert_eq!(run(source), "42\n");
}

#[test]
fn test_inherited_fields() {
    let source = "type Base struct { name string }\n\
                  type Item -> Base { count int }\n\
                  func (b Base) label() string { return \"item \" + b.name }\n\
                  i := Item{name: \"x\", count: 2}\n\
                  print i.name, i.count";
    assert_eq!(run(source), "x 2\n");
}

#[test]
fn test_named_results_and_multiple_returns() {
    let source = "func split(n int) (q int, r int) {\n\
                  q = n / 10\n\
                  r = n % 10\n\
                  return\n\
                  }\n\
                  func swap(a, b string) (string, string) { return b, a }\n\
                  func again(a, b string) (string, string) { return swap(a, b) }\n\
                  q, r := split(47)\n\
                  x, y := again(\"1\", \"2\")\n\
                  print q, r, x, y";
    assert_eq!(run(source), "4 7 2 1\n");
}

#[test]
fn test_variadic_and_spread() {
    let source = "func sum(base int, values ...int) int {\n\
                  for _, v := range values { base += v }\n\
                  return base\n\
                  }\n\
                  nums := []int{1, 2, 3}\n\
                  print sum(10), sum(1, 2), sum(0, nums...)";
    assert_eq!(run(source), "10 3 6\n");
}

#[test]
fn test_var_declarations() {
    let source = "var (\n a int\n b, c = \"x\", 2.5\n)\n\
                  var s []string\n\
                  var m map[string]int\n\
                  print a, b, c, len(s), len(m)";
    assert_eq!(run(source), "0 x 2.5 0 0\n");
}

#[test]
fn test_assignment_targets() {
    let source = "a := [1, 2, 3]\n\
                  a[1] = 20\n\
                  s := {name: \"x\", inner: {v: 1}}\n\
                  s.inner.v = 5\n\
                  s.name += \"y\"\n\
                  x, y := 1, 2\n\
                  x, y = y, x\n\
                  print a, s.name, s.inner.v, x, y";
    assert_eq!(run(source), "[1, 20, 3] xy 5 2 1\n");
}

#[test]
fn test_constants_fold_from_constants() {
    let source = "const (\n base = 10\n double = base * 2\n)\n\
                  print double";
    assert_eq!(run(source), "20\n");
}

#[test]
fn test_ternary_and_short_circuit() {
    let source = "func boom() bool { panic(\"evaluated\") }\n\
                  x := 3\n\
                  print x > 2 ? \"yes\" : \"no\"\n\
                  print false && boom(), true || boom()";
    assert_eq!(run(source), "yes\nfalse true\n");
}

#[test]
fn test_try_catch_binds_error() {
    let source = "try {\n\
                  panic(\"bad\")\n\
                  } catch e {\n\
                  print \"caught\", e\n\
                  }\n\
                  for i := 0; i < 3; i++ {\n\
                  try {\n\
                  if i == 1 { continue }\n\
                  print i\n\
                  } catch {\n\
                  print \"never\"\n\
                  }\n\
                  }";
    assert_eq!(run(source), "caught bad\n0\n2\n");
}

#[test]
fn test_directives() {
    let source = "@global shared 7\n\
                  func f() int { return shared + 1 }\n\
                  print f()\n\
                  @say 1 + 1\n\
                  @template greet \"hello\"\n\
                  @log user \"logged, not printed\"";
    assert_eq!(run(source), "8\n2\n");
}

#[test]
fn test_error_directive_raises() {
    let (runtime, _) = Runtime::with_capture();
    let err = runtime.run("test", "@error \"stopped here\"").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Panic);
    assert_eq!(err.message(), "stopped here");
}

#[test]
fn test_assert_statement() {
    let (runtime, output) = Runtime::with_capture();
    runtime.run("test", "assert 1 < 2\nprint \"ok\"").unwrap();
    assert_eq!(output.contents(), "ok\n");
    let err = runtime.run("test", "assert 1 > 2, \"math broke\"").unwrap_err();
    assert_eq!(err.message(), "math broke");
}

#[test]
fn test_array_statement() {
    assert_eq!(run("array a[3] = 1\narray b[2]\nprint a, b"), "[1, 1, 1] [<nil>, <nil>]\n");
}

#[test]
fn test_builtin_package_dot_import() {
    let source = "import . \"strings\"\nprint upper(\"abc\")";
    assert_eq!(run(source), "ABC\n");
}

#[test]
fn test_source_package_import() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("geometry.tern"),
        "package geometry\n\
         const scale = 2\n\
         func area(w, h int) int { return w * h * scale }\n",
    )
    .unwrap();
    let (runtime, output) = Runtime::with_capture();
    let mut compiler =
        Compiler::new("main", &runtime.settings).with_base_dir(dir.path());
    let code = compiler
        .compile("import \"geometry\"\nimport \"geometry\"\nprint geometry.area(3, 4)")
        .unwrap();
    runtime.execute(code).unwrap();
    assert_eq!(output.contents(), "24\n");
}

#[test]
fn test_repl_echoes_expressions() {
    let (runtime, output) = Runtime::with_capture();
    let mut compiler = Compiler::new("repl", &runtime.settings);
    compiler.set_repl(true);
    let symbols = runtime.root();
    for line in ["x := 20", "x + 1", "func f() {}", "f()"] {
        let code = compiler.compile(line).unwrap();
        runtime.execute_in(code, &symbols).unwrap();
    }
    assert_eq!(output.contents(), "21\n");
}

#[test]
fn test_normalized_identifiers() {
    let settings = Settings {
        normalize: true,
        ..Settings::default()
    };
    let (runtime, output) = Runtime::with_capture();
    let code = Compiler::new("test", &settings).compile("Total := 3\nprint TOTAL").unwrap();
    runtime.execute(code).unwrap();
    assert_eq!(output.contents(), "3\n");
}
