//! End-to-end scenarios driving the real parser, schema compiler, JSON
//! codec, and validator together, one per testable property.

use serde_json::json;

use yang_core::{Context, ContextOptions};
use yang_compiler::{compile_source, SourceFormat};
use yang_validate::{from_json, validate, NoMounts};

fn compile(src: &str) -> (Context, yang_schema::CompiledModule) {
    let ctx = Context::new(ContextOptions::empty());
    let (_, module, diagnostics) = compile_source(&ctx, src, SourceFormat::Yang).expect("parses");
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
    (ctx, module)
}

fn check(ctx: &Context, module: &yang_schema::CompiledModule, data: serde_json::Value) -> Result<(), ()> {
    let mut tree = from_json(ctx, module, &data);
    validate(ctx, module, &mut tree, &NoMounts).map_err(|_| ())
}

/// S1: typedef small-int { int8, range 0..10 }; leaf x accepts 5, rejects
/// -1 and "five".
#[test]
fn s1_typedef_range_restriction() {
    let src = r#"
        module s1 {
          namespace "urn:s1";
          prefix s1;

          typedef small-int {
            type int8 {
              range "0..10";
            }
          }

          leaf x {
            type small-int;
          }
        }
    "#;
    let (ctx, module) = compile(src);

    assert!(check(&ctx, &module, json!({"x": 5})).is_ok());
    assert!(check(&ctx, &module, json!({"x": -1})).is_err());
    assert!(check(&ctx, &module, json!({"x": "five"})).is_err());
}

/// S2: leaf name; leaf ref with `path "../name"` accepts a value that
/// matches an existing `name` instance, rejects one that doesn't.
#[test]
fn s2_leafref_existence() {
    let src = r#"
        module s2 {
          namespace "urn:s2";
          prefix s2;

          container top {
            leaf name {
              type string;
            }
            leaf ref {
              type leafref {
                path "../name";
              }
            }
          }
        }
    "#;
    let (ctx, module) = compile(src);

    assert!(check(&ctx, &module, json!({"top": {"name": "a", "ref": "a"}})).is_ok());
    assert!(check(&ctx, &module, json!({"top": {"name": "a", "ref": "b"}})).is_err());
}

/// S3: leaf b has `when "../a='yes'"` and `must ".!=0"`. Pruned when `a` is
/// anything but "yes"; rejected by `must` when present under a true `when`
/// with a zero value; accepted when present, non-zero, and `when` is true.
#[test]
fn s3_when_prunes_must_rejects() {
    let src = r#"
        module s3 {
          namespace "urn:s3";
          prefix s3;

          container top {
            leaf a {
              type string;
            }
            leaf b {
              type int32;
              when "../a = 'yes'";
              must ". != 0";
            }
          }
        }
    "#;
    let (ctx, module) = compile(src);

    // when false: b is pruned, never reached by must, so it's fine even at 0.
    assert!(check(&ctx, &module, json!({"top": {"a": "no", "b": 0}})).is_ok());
    // when true, must true.
    assert!(check(&ctx, &module, json!({"top": {"a": "yes", "b": 3}})).is_ok());
    // when true, must false.
    assert!(check(&ctx, &module, json!({"top": {"a": "yes", "b": 0}})).is_err());
}

/// S4: an augment adds a mandatory leaf to an existing container; an
/// instance missing the augmented leaf fails mandatory-node checking.
/// (Same-module augment: cross-module `import`/augment merging is a layer
/// above `compile_module` that doesn't exist yet — see DESIGN.md.)
#[test]
fn s4_augment_adds_mandatory_leaf() {
    let src = r#"
        module s4 {
          namespace "urn:s4";
          prefix s4;

          container root {
          }

          augment "/root" {
            leaf added {
              type string;
              mandatory true;
            }
          }
        }
    "#;
    let (ctx, module) = compile(src);

    assert!(check(&ctx, &module, json!({"root": {}})).is_err());
    assert!(check(&ctx, &module, json!({"root": {"added": "x"}})).is_ok());
}

/// S5: identities animal / mammal (base animal) / dog (base mammal), plus
/// an unrelated plant identity. A leaf of `identityref { base animal; }`
/// accepts "dog" (derived through mammal) and rejects "plant".
#[test]
fn s5_identityref_base_derivation() {
    let src = r#"
        module s5 {
          namespace "urn:s5";
          prefix s5;

          identity animal;

          identity mammal {
            base animal;
          }

          identity dog {
            base mammal;
          }

          identity plant;

          leaf kind {
            type identityref {
              base animal;
            }
          }
        }
    "#;
    let (ctx, module) = compile(src);

    assert!(check(&ctx, &module, json!({"kind": "dog"})).is_ok());
    assert!(check(&ctx, &module, json!({"kind": "plant"})).is_err());
}
