//! The schema compiler: turns one parsed module's statement tree into a
//! [`CompiledModule`] — expanding `uses`/grouping, applying `augment` and
//! `deviation`, building the module's identity DAG, and compiling every
//! `type`, `when`, and `must` along the way.
//!
//! Scope note: grouping/typedef/identity lookup is module-local (a
//! dependency set's cross-module `import`-visible symbol table is built one
//! layer up, by whatever assembles a compiled set from several modules);
//! `augment`/`refine` target-path matching only follows plain child-name
//! steps, not full descendant-or-self or predicate-qualified paths.

use std::collections::HashMap;
use std::rc::Rc;

use yang_core::{Context, Symbol};
use yang_schema::compiled::{
    Cardinality, CompiledModule, CompiledNode, ExtInstance, ExtPayload, MountPointData, NodeFlags,
    NodeId, NodeKind,
};
use yang_schema::{Stmt, StmtKeyword};

use crate::diagnostics::Diagnostics;
use crate::types::{self, TypeError, TypedefScope};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("type error: {0}")]
    Type(#[from] TypeError),
    #[error("xpath error in {0}: {1}")]
    XPath(&'static str, crate::xpath::XPathError),
    #[error("unresolved grouping '{0}'")]
    UnresolvedGrouping(String),
    #[error("unresolved augment target '{0}'")]
    UnresolvedTarget(String),
    #[error("module has no namespace")]
    MissingNamespace,
    #[error("conflicting deviation on '{0}': '{1}' deviated more than once")]
    ConflictingDeviation(String, &'static str),
}

/// A single schema property a `deviate` substatement can touch, used to
/// detect two deviations (from the same or different `deviation`
/// statements) disagreeing about the same target's same property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DeviatedProperty {
    NotSupported,
    Type,
    Default,
    Config,
    Mandatory,
    MinElements,
    MaxElements,
    Unique,
}

impl DeviatedProperty {
    fn label(self) -> &'static str {
        match self {
            DeviatedProperty::NotSupported => "not-supported",
            DeviatedProperty::Type => "type",
            DeviatedProperty::Default => "default",
            DeviatedProperty::Config => "config",
            DeviatedProperty::Mandatory => "mandatory",
            DeviatedProperty::MinElements => "min-elements",
            DeviatedProperty::MaxElements => "max-elements",
            DeviatedProperty::Unique => "unique",
        }
    }
}

fn mark_deviated_property(
    touched: &mut HashMap<(NodeId, DeviatedProperty), ()>,
    target: NodeId,
    prop: DeviatedProperty,
    path: &str,
) -> Result<(), SchemaError> {
    if touched.insert((target, prop), ()).is_some() {
        return Err(SchemaError::ConflictingDeviation(path.to_string(), prop.label()));
    }
    Ok(())
}

fn cardinality_mut(kind: &mut NodeKind) -> Option<&mut Cardinality> {
    match kind {
        NodeKind::List { cardinality, .. } | NodeKind::LeafList { cardinality, .. } => Some(cardinality),
        _ => None,
    }
}

struct Ctx<'a> {
    ctx: &'a Context,
    module_name: Symbol,
    typedefs: TypedefScope,
    groupings: HashMap<Symbol, &'a Stmt>,
    diagnostics: Diagnostics,
}

/// Compile one parsed module (already resolved against its own `import`s by
/// a higher layer, which is expected to have merged any externally visible
/// typedefs/groupings into the statement tree or a future extended scope —
/// not yet wired here) into its schema tree.
pub fn compile_module(
    ctx: &Context,
    parsed: &yang_schema::ParsedModule,
) -> Result<(CompiledModule, Diagnostics), SchemaError> {
    let root = &parsed.root;
    let module_name = root.argument.ok_or(SchemaError::MissingNamespace)?;

    let mut scope = Ctx {
        ctx,
        module_name,
        typedefs: TypedefScope::new(),
        groupings: HashMap::new(),
        diagnostics: Diagnostics::new(),
    };

    collect_groupings(root, &mut scope.groupings);

    let mut module = CompiledModule::new();
    compile_identities(root, &mut module, &scope)?;
    compile_typedefs(root, &mut scope, &module.identities)?;

    for child in &root.substatements {
        match child.keyword {
            StmtKeyword::Container
            | StmtKeyword::Leaf
            | StmtKeyword::LeafList
            | StmtKeyword::List
            | StmtKeyword::Choice
            | StmtKeyword::AnyData
            | StmtKeyword::AnyXml
            | StmtKeyword::Uses => {
                let ids = compile_data_def(child, None, &mut scope, &mut module)?;
                module.top_level.extend(ids);
            }
            StmtKeyword::Rpc => {
                let id = compile_rpc_like(child, None, &mut scope, &mut module, true)?;
                module.rpcs.push(id);
            }
            StmtKeyword::Notification => {
                let id = compile_notification(child, None, &mut scope, &mut module)?;
                module.notifications.push(id);
            }
            _ => {}
        }
    }

    apply_augments(root, &mut scope, &mut module)?;
    apply_deviations(root, &mut scope, &mut module)?;

    Ok((module, scope.diagnostics))
}

fn collect_groupings<'a>(stmt: &'a Stmt, out: &mut HashMap<Symbol, &'a Stmt>) {
    for child in &stmt.substatements {
        if child.keyword == StmtKeyword::Grouping {
            if let Some(name) = child.argument {
                out.insert(name, child);
            }
        }
        collect_groupings(child, out);
    }
}

fn compile_typedefs(
    stmt: &Stmt,
    scope: &mut Ctx<'_>,
    identities: &yang_schema::IdentityGraph,
) -> Result<(), SchemaError> {
    for child in &stmt.substatements {
        if child.keyword == StmtKeyword::Typedef {
            if let Some(name) = child.argument {
                let type_stmt = child
                    .child(StmtKeyword::Type)
                    .ok_or_else(|| TypeError::MissingSubstatement("typedef", "type"))?;
                let ty = types::compile_type(scope.ctx, type_stmt, &scope.typedefs, identities)?;
                scope.typedefs.define(name, Rc::new(ty));
            }
        }
        compile_typedefs(child, scope, identities)?;
    }
    Ok(())
}

fn compile_identities(
    root: &Stmt,
    module: &mut CompiledModule,
    scope: &Ctx<'_>,
) -> Result<(), SchemaError> {
    let identity_stmts: Vec<&Stmt> = root.children(StmtKeyword::Identity).collect();
    let mut name_to_id = HashMap::new();
    for (idx, stmt) in identity_stmts.iter().enumerate() {
        if let Some(name) = stmt.argument {
            name_to_id.insert(name, yang_schema::IdentityId(idx as u32));
        }
    }
    for stmt in &identity_stmts {
        let name = stmt.argument.expect("identity requires an argument");
        let bases: Vec<_> = stmt
            .children(StmtKeyword::Base)
            .filter_map(|b| b.argument)
            .filter_map(|base_name| name_to_id.get(&base_name).copied())
            .collect();
        module.identities.push(name, scope.module_name, bases);
    }
    module.identities.materialize_derived();
    Ok(())
}

fn compile_when_must(
    stmt: &Stmt,
    scope: &mut Ctx<'_>,
) -> Result<(Vec<Rc<yang_schema::CompiledExpr>>, Vec<Rc<yang_schema::CompiledExpr>>), SchemaError> {
    let mut when = Vec::new();
    for w in stmt.children(StmtKeyword::When) {
        let text = w.argument.map(|s| scope.ctx.dict().resolve(s).to_string());
        if let Some(text) = text {
            let expr = crate::xpath::compile(scope.ctx, &text)
                .map_err(|e| SchemaError::XPath("when", e))?;
            when.push(Rc::new(expr));
        }
    }
    let mut must = Vec::new();
    for m in stmt.children(StmtKeyword::Must) {
        let text = m.argument.map(|s| scope.ctx.dict().resolve(s).to_string());
        if let Some(text) = text {
            let expr = crate::xpath::compile(scope.ctx, &text)
                .map_err(|e| SchemaError::XPath("must", e))?;
            must.push(Rc::new(expr));
        }
    }
    Ok((when, must))
}

fn compile_ext_instances(stmt: &Stmt, scope: &Ctx<'_>) -> Vec<ExtInstance> {
    stmt.substatements
        .iter()
        .filter_map(|child| match child.keyword {
            StmtKeyword::Extended(prefix, name) => {
                let name_text = scope.ctx.dict().resolve(name).to_string();
                let payload = if name_text == "mount-point" {
                    child.argument.map(|label| {
                        let shared = child
                            .children(StmtKeyword::Config)
                            .next()
                            .and_then(|c| c.argument)
                            .map(|sym| scope.ctx.dict().resolve(sym) != "inline")
                            .unwrap_or(true);
                        ExtPayload::MountPoint(MountPointData { label, shared })
                    })
                } else {
                    None
                };
                Some(ExtInstance {
                    module: prefix,
                    name,
                    argument: child.argument,
                    payload: payload.unwrap_or(ExtPayload::Opaque),
                })
            }
            _ => None,
        })
        .collect()
}

fn status_flags(stmt: &Stmt, scope: &Ctx<'_>) -> NodeFlags {
    stmt.child(StmtKeyword::Status)
        .and_then(|s| s.argument)
        .map(|sym| match scope.ctx.dict().resolve(sym) {
            "deprecated" => NodeFlags::STATUS_DEPRECATED,
            "obsolete" => NodeFlags::STATUS_OBSOLETE,
            _ => NodeFlags::empty(),
        })
        .unwrap_or(NodeFlags::empty())
}

fn config_flag(stmt: &Stmt, scope: &Ctx<'_>) -> NodeFlags {
    stmt.child(StmtKeyword::Config)
        .and_then(|c| c.argument)
        .map(|sym| scope.ctx.dict().resolve(sym) == "false")
        .unwrap_or(false)
        .then_some(NodeFlags::CONFIG_FALSE)
        .unwrap_or(NodeFlags::empty())
}

fn mandatory_flag(stmt: &Stmt, scope: &Ctx<'_>) -> NodeFlags {
    stmt.child(StmtKeyword::Mandatory)
        .and_then(|m| m.argument)
        .map(|sym| scope.ctx.dict().resolve(sym) == "true")
        .unwrap_or(false)
        .then_some(NodeFlags::MANDATORY)
        .unwrap_or(NodeFlags::empty())
}

/// `ordered-by user` vs the default `ordered-by system` (RFC 7950 §7.7.7 /
/// §7.8.6) — only meaningful on `list`/`leaf-list`, but harmless to compute
/// for other keywords since they never carry an `ordered-by` substatement.
fn ordered_by_flag(stmt: &Stmt, scope: &Ctx<'_>) -> NodeFlags {
    stmt.child(StmtKeyword::OrderedBy)
        .and_then(|o| o.argument)
        .map(|sym| scope.ctx.dict().resolve(sym) == "user")
        .unwrap_or(false)
        .then_some(NodeFlags::ORDERED_BY_USER)
        .unwrap_or(NodeFlags::empty())
}

fn cardinality(stmt: &Stmt, scope: &Ctx<'_>) -> Cardinality {
    let min_elements = stmt
        .child(StmtKeyword::MinElements)
        .and_then(|m| m.argument)
        .and_then(|sym| scope.ctx.dict().resolve(sym).parse().ok())
        .unwrap_or(0);
    let max_elements = stmt
        .child(StmtKeyword::MaxElements)
        .and_then(|m| m.argument)
        .and_then(|sym| {
            let text = scope.ctx.dict().resolve(sym);
            if text == "unbounded" {
                None
            } else {
                text.parse().ok()
            }
        });
    Cardinality {
        min_elements,
        max_elements,
    }
}

/// Compile one data-definition statement (and, for containers/lists/cases,
/// its children) into the arena, expanding `uses` inline. Returns every
/// node produced at this position — always exactly one, except `uses`,
/// which can expand to any number of the named grouping's data nodes.
fn compile_data_def(
    stmt: &Stmt,
    parent: Option<NodeId>,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
) -> Result<Vec<NodeId>, SchemaError> {
    if stmt.keyword == StmtKeyword::Uses {
        return compile_uses(stmt, parent, scope, module);
    }

    let name = stmt
        .argument
        .unwrap_or_else(|| scope.ctx.dict().insert("<unnamed>"));
    let (when, must) = compile_when_must(stmt, scope)?;
    let ext_instances = compile_ext_instances(stmt, scope);
    let flags =
        status_flags(stmt, scope) | config_flag(stmt, scope) | mandatory_flag(stmt, scope) | ordered_by_flag(stmt, scope);

    let kind = match stmt.keyword {
        StmtKeyword::Container => {
            let presence = stmt.child(StmtKeyword::Presence).is_some();
            let id = module.push(CompiledNode {
                parent,
                name,
                module: scope.module_name,
                flags,
                when,
                must,
                ext_instances,
                kind: NodeKind::Container {
                    children: Vec::new(),
                    presence,
                },
            });
            let children = compile_children(stmt, id, scope, module)?;
            if let NodeKind::Container { children: c, .. } = &mut module.nodes[id.0 as usize].kind
            {
                *c = children;
            }
            return Ok(vec![id]);
        }
        StmtKeyword::List => {
            let keys: Vec<Symbol> = stmt
                .child(StmtKeyword::Key)
                .and_then(|k| k.argument)
                .map(|sym| {
                    scope
                        .ctx
                        .dict()
                        .resolve(sym)
                        .split_whitespace()
                        .map(|s| scope.ctx.dict().insert(s))
                        .collect()
                })
                .unwrap_or_default();
            let unique_groups: Vec<Vec<Symbol>> = stmt
                .children(StmtKeyword::Unique)
                .filter_map(|u| u.argument)
                .map(|sym| {
                    scope
                        .ctx
                        .dict()
                        .resolve(sym)
                        .split_whitespace()
                        .map(|s| scope.ctx.dict().insert(s))
                        .collect()
                })
                .collect();
            let id = module.push(CompiledNode {
                parent,
                name,
                module: scope.module_name,
                flags,
                when,
                must,
                ext_instances,
                kind: NodeKind::List {
                    children: Vec::new(),
                    keys,
                    unique_groups,
                    cardinality: cardinality(stmt, scope),
                },
            });
            let children = compile_children(stmt, id, scope, module)?;
            if let NodeKind::List { children: c, .. } = &mut module.nodes[id.0 as usize].kind {
                *c = children;
            }
            return Ok(vec![id]);
        }
        StmtKeyword::Leaf => {
            let type_stmt = stmt
                .child(StmtKeyword::Type)
                .ok_or(TypeError::MissingSubstatement("leaf", "type"))?;
            let ty = Rc::new(types::compile_type(scope.ctx, type_stmt, &scope.typedefs, &module.identities)?);
            let default = stmt.child(StmtKeyword::Default).and_then(|d| d.argument);
            let units = stmt.child(StmtKeyword::Units).and_then(|u| u.argument);
            NodeKind::Leaf {
                ty,
                default,
                units,
            }
        }
        StmtKeyword::LeafList => {
            let type_stmt = stmt
                .child(StmtKeyword::Type)
                .ok_or(TypeError::MissingSubstatement("leaf-list", "type"))?;
            let ty = Rc::new(types::compile_type(scope.ctx, type_stmt, &scope.typedefs, &module.identities)?);
            let defaults = stmt
                .children(StmtKeyword::Default)
                .filter_map(|d| d.argument)
                .collect();
            let units = stmt.child(StmtKeyword::Units).and_then(|u| u.argument);
            NodeKind::LeafList {
                ty,
                defaults,
                cardinality: cardinality(stmt, scope),
                units,
            }
        }
        StmtKeyword::Choice => {
            let id = module.push(CompiledNode {
                parent,
                name,
                module: scope.module_name,
                flags,
                when,
                must,
                ext_instances,
                kind: NodeKind::Choice {
                    cases: Vec::new(),
                    default_case: None,
                },
            });
            let mut cases = Vec::new();
            for child in &stmt.substatements {
                match child.keyword {
                    StmtKeyword::Case => {
                        if let Some(case_id) = compile_case(child, id, scope, module)? {
                            cases.push(case_id);
                        }
                    }
                    StmtKeyword::Container
                    | StmtKeyword::Leaf
                    | StmtKeyword::LeafList
                    | StmtKeyword::List
                    | StmtKeyword::AnyData
                    | StmtKeyword::AnyXml => {
                        // A short-hand case: the data node is itself the case.
                        cases.extend(compile_data_def(child, Some(id), scope, module)?);
                    }
                    _ => {}
                }
            }
            let default_case = stmt
                .child(StmtKeyword::Default)
                .and_then(|d| d.argument)
                .and_then(|want| {
                    cases
                        .iter()
                        .find(|&&c| module.get(c).name == want)
                        .copied()
                });
            if let NodeKind::Choice {
                cases: c,
                default_case: dc,
            } = &mut module.nodes[id.0 as usize].kind
            {
                *c = cases;
                *dc = default_case;
            }
            return Ok(vec![id]);
        }
        StmtKeyword::AnyData => NodeKind::AnyData,
        StmtKeyword::AnyXml => NodeKind::AnyXml,
        _ => return Ok(Vec::new()),
    };

    Ok(vec![module.push(CompiledNode {
        parent,
        name,
        module: scope.module_name,
        flags,
        when,
        must,
        ext_instances,
        kind,
    })])
}

fn compile_case(
    stmt: &Stmt,
    parent: NodeId,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
) -> Result<Option<NodeId>, SchemaError> {
    let name = stmt.argument.unwrap_or_else(|| scope.ctx.dict().insert("<case>"));
    let (when, must) = compile_when_must(stmt, scope)?;
    let id = module.push(CompiledNode {
        parent: Some(parent),
        name,
        module: scope.module_name,
        flags: status_flags(stmt, scope),
        when,
        must,
        ext_instances: compile_ext_instances(stmt, scope),
        kind: NodeKind::Case {
            children: Vec::new(),
        },
    });
    let children = compile_children(stmt, id, scope, module)?;
    if let NodeKind::Case { children: c } = &mut module.nodes[id.0 as usize].kind {
        *c = children;
    }
    Ok(Some(id))
}

fn compile_children(
    stmt: &Stmt,
    parent: NodeId,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
) -> Result<Vec<NodeId>, SchemaError> {
    let mut children = Vec::new();
    for child in &stmt.substatements {
        if matches!(
            child.keyword,
            StmtKeyword::Container
                | StmtKeyword::Leaf
                | StmtKeyword::LeafList
                | StmtKeyword::List
                | StmtKeyword::Choice
                | StmtKeyword::AnyData
                | StmtKeyword::AnyXml
                | StmtKeyword::Uses
        ) {
            children.extend(compile_data_def(child, Some(parent), scope, module)?);
        }
    }
    Ok(children)
}

fn compile_uses(
    stmt: &Stmt,
    parent: Option<NodeId>,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
) -> Result<Vec<NodeId>, SchemaError> {
    let grouping_name = stmt
        .argument
        .ok_or(TypeError::MissingSubstatement("uses", "argument"))?;
    let grouping = *scope.groupings.get(&grouping_name).ok_or_else(|| {
        SchemaError::UnresolvedGrouping(scope.ctx.dict().resolve(grouping_name).to_string())
    })?;
    // Refine targets are matched against each produced node's own name, so
    // a `refine` applies correctly whether the node came from a direct
    // grouping member or from a nested `uses` within it.
    let refines: HashMap<Symbol, &Stmt> = stmt
        .children(StmtKeyword::Refine)
        .filter_map(|r| r.argument.map(|a| (a, r)))
        .collect();

    let mut produced = Vec::new();
    for child in &grouping.substatements {
        if matches!(
            child.keyword,
            StmtKeyword::Container
                | StmtKeyword::Leaf
                | StmtKeyword::LeafList
                | StmtKeyword::List
                | StmtKeyword::Choice
                | StmtKeyword::AnyData
                | StmtKeyword::AnyXml
                | StmtKeyword::Uses
        ) {
            let ids = compile_data_def(child, parent, scope, module)?;
            for id in ids {
                module.nodes[id.0 as usize].flags |= NodeFlags::FROM_USES;
                let node_name = module.nodes[id.0 as usize].name;
                if let Some(refine) = refines.get(&node_name) {
                    apply_refine(refine, id, scope, module);
                }
                produced.push(id);
            }
        }
    }
    Ok(produced)
}

fn apply_refine(refine: &Stmt, target: NodeId, scope: &Ctx<'_>, module: &mut CompiledModule) {
    let node = &mut module.nodes[target.0 as usize];
    if let Some(default) = refine.child(StmtKeyword::Default).and_then(|d| d.argument) {
        if let NodeKind::Leaf { default: d, .. } = &mut node.kind {
            *d = Some(default);
        }
    }
    if refine
        .child(StmtKeyword::Mandatory)
        .and_then(|m| m.argument)
        .map(|s| scope.ctx.dict().resolve(s) == "true")
        .unwrap_or(false)
    {
        node.flags |= NodeFlags::MANDATORY;
    }
    if refine
        .child(StmtKeyword::Config)
        .and_then(|c| c.argument)
        .map(|s| scope.ctx.dict().resolve(s) == "false")
        .unwrap_or(false)
    {
        node.flags |= NodeFlags::CONFIG_FALSE;
    }
}

fn compile_rpc_like(
    stmt: &Stmt,
    parent: Option<NodeId>,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
    is_rpc: bool,
) -> Result<NodeId, SchemaError> {
    let name = stmt.argument.expect("rpc/action requires an argument");
    let id = module.push(CompiledNode {
        parent,
        name,
        module: scope.module_name,
        flags: status_flags(stmt, scope),
        when: Vec::new(),
        must: Vec::new(),
        ext_instances: compile_ext_instances(stmt, scope),
        kind: if is_rpc {
            NodeKind::Rpc {
                input: None,
                output: None,
            }
        } else {
            NodeKind::Action {
                input: None,
                output: None,
            }
        },
    });
    let input = match stmt.child(StmtKeyword::Input) {
        Some(input_stmt) => Some(compile_io(input_stmt, id, scope, module, true)?),
        None => None,
    };
    let output = match stmt.child(StmtKeyword::Output) {
        Some(output_stmt) => Some(compile_io(output_stmt, id, scope, module, false)?),
        None => None,
    };
    match &mut module.nodes[id.0 as usize].kind {
        NodeKind::Rpc { input: i, output: o } | NodeKind::Action { input: i, output: o } => {
            *i = input;
            *o = output;
        }
        _ => unreachable!(),
    }
    Ok(id)
}

fn compile_io(
    stmt: &Stmt,
    parent: NodeId,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
    is_input: bool,
) -> Result<NodeId, SchemaError> {
    let name = scope
        .ctx
        .dict()
        .insert(if is_input { "input" } else { "output" });
    let id = module.push(CompiledNode {
        parent: Some(parent),
        name,
        module: scope.module_name,
        flags: NodeFlags::empty(),
        when: Vec::new(),
        must: Vec::new(),
        ext_instances: Vec::new(),
        kind: if is_input {
            NodeKind::Input { children: Vec::new() }
        } else {
            NodeKind::Output { children: Vec::new() }
        },
    });
    let children = compile_children(stmt, id, scope, module)?;
    match &mut module.nodes[id.0 as usize].kind {
        NodeKind::Input { children: c } | NodeKind::Output { children: c } => *c = children,
        _ => unreachable!(),
    }
    Ok(id)
}

fn compile_notification(
    stmt: &Stmt,
    parent: Option<NodeId>,
    scope: &mut Ctx<'_>,
    module: &mut CompiledModule,
) -> Result<NodeId, SchemaError> {
    let name = stmt.argument.expect("notification requires an argument");
    let id = module.push(CompiledNode {
        parent,
        name,
        module: scope.module_name,
        flags: status_flags(stmt, scope),
        when: Vec::new(),
        must: Vec::new(),
        ext_instances: compile_ext_instances(stmt, scope),
        kind: NodeKind::Notification { children: Vec::new() },
    });
    let children = compile_children(stmt, id, scope, module)?;
    if let NodeKind::Notification { children: c } = &mut module.nodes[id.0 as usize].kind {
        *c = children;
    }
    Ok(id)
}

/// Resolve a `/`-separated (optionally `prefix:`-qualified) schema node
/// path against already-compiled top-level nodes, by child name only.
fn resolve_schema_path(module: &CompiledModule, roots: &[NodeId], path: &str, ctx: &Context) -> Option<NodeId> {
    let mut steps = path.trim_start_matches('/').split('/');
    let first = steps.next()?;
    let first_name = first.rsplit(':').next().unwrap_or(first);
    let mut current = roots.iter().copied().find(|&id| {
        ctx.dict().resolve(module.get(id).name) == first_name
    })?;
    for step in steps {
        let step_name = step.rsplit(':').next().unwrap_or(step);
        current = module
            .get(current)
            .kind
            .children()
            .iter()
            .copied()
            .find(|&id| ctx.dict().resolve(module.get(id).name) == step_name)?;
    }
    Some(current)
}

fn apply_augments(root: &Stmt, scope: &mut Ctx<'_>, module: &mut CompiledModule) -> Result<(), SchemaError> {
    let augment_stmts: Vec<&Stmt> = root.children(StmtKeyword::Augment).collect();
    for augment in augment_stmts {
        let path_sym = augment
            .argument
            .ok_or(TypeError::MissingSubstatement("augment", "argument"))?;
        let path = scope.ctx.dict().resolve(path_sym).to_string();
        let target = resolve_schema_path(module, &module.top_level.clone(), &path, scope.ctx)
            .ok_or_else(|| SchemaError::UnresolvedTarget(path.clone()))?;
        let new_children = compile_children(augment, target, scope, module)?;
        for &child in &new_children {
            module.nodes[child.0 as usize].flags |= NodeFlags::AUGMENTED;
        }
        match &mut module.nodes[target.0 as usize].kind {
            NodeKind::Container { children, .. }
            | NodeKind::List { children, .. }
            | NodeKind::Case { children }
            | NodeKind::Notification { children }
            | NodeKind::Input { children }
            | NodeKind::Output { children } => children.extend(new_children),
            _ => {}
        }
        module.augmented_by.push(scope.module_name);
    }
    Ok(())
}

fn apply_deviations(root: &Stmt, scope: &mut Ctx<'_>, module: &mut CompiledModule) -> Result<(), SchemaError> {
    let deviation_stmts: Vec<&Stmt> = root.children(StmtKeyword::Deviation).collect();
    let mut touched: HashMap<(NodeId, DeviatedProperty), ()> = HashMap::new();
    for deviation in deviation_stmts {
        let path_sym = deviation
            .argument
            .ok_or(TypeError::MissingSubstatement("deviation", "argument"))?;
        let path = scope.ctx.dict().resolve(path_sym).to_string();
        let Some(target) = resolve_schema_path(module, &module.top_level.clone(), &path, scope.ctx)
        else {
            continue;
        };
        for deviate in deviation.children(StmtKeyword::Deviate) {
            let kind = deviate
                .argument
                .map(|s| scope.ctx.dict().resolve(s).to_string())
                .unwrap_or_default();

            if kind == "not-supported" {
                mark_deviated_property(&mut touched, target, DeviatedProperty::NotSupported, &path)?;
                module.nodes[target.0 as usize].flags |= NodeFlags::DEVIATED;
                continue;
            }
            module.nodes[target.0 as usize].flags |= NodeFlags::DEVIATED;

            if let Some(mandatory) = deviate.child(StmtKeyword::Mandatory).and_then(|m| m.argument) {
                mark_deviated_property(&mut touched, target, DeviatedProperty::Mandatory, &path)?;
                let want = scope.ctx.dict().resolve(mandatory) == "true";
                let flags = &mut module.nodes[target.0 as usize].flags;
                if want {
                    *flags |= NodeFlags::MANDATORY;
                } else {
                    flags.remove(NodeFlags::MANDATORY);
                }
            }

            if let Some(config) = deviate.child(StmtKeyword::Config).and_then(|c| c.argument) {
                mark_deviated_property(&mut touched, target, DeviatedProperty::Config, &path)?;
                let want_false = scope.ctx.dict().resolve(config) == "false";
                let flags = &mut module.nodes[target.0 as usize].flags;
                if want_false {
                    *flags |= NodeFlags::CONFIG_FALSE;
                } else {
                    flags.remove(NodeFlags::CONFIG_FALSE);
                }
            }

            // `replace` is the only deviate kind RFC 7950 §7.20.3.2 allows a
            // `type` substatement under.
            if kind == "replace" {
                if let Some(type_stmt) = deviate.child(StmtKeyword::Type) {
                    mark_deviated_property(&mut touched, target, DeviatedProperty::Type, &path)?;
                    let new_ty = Rc::new(types::compile_type(
                        scope.ctx,
                        type_stmt,
                        &scope.typedefs,
                        &module.identities,
                    )?);
                    match &mut module.nodes[target.0 as usize].kind {
                        NodeKind::Leaf { ty, .. } | NodeKind::LeafList { ty, .. } => *ty = new_ty,
                        _ => {}
                    }
                }
            }

            let default_args: Vec<Symbol> = deviate
                .children(StmtKeyword::Default)
                .filter_map(|d| d.argument)
                .collect();
            if !default_args.is_empty() {
                mark_deviated_property(&mut touched, target, DeviatedProperty::Default, &path)?;
                match &mut module.nodes[target.0 as usize].kind {
                    NodeKind::Leaf { default, .. } => match kind.as_str() {
                        "add" | "replace" => *default = default_args.first().copied(),
                        "delete" => *default = None,
                        _ => {}
                    },
                    NodeKind::LeafList { defaults, .. } => match kind.as_str() {
                        "add" => {
                            for v in &default_args {
                                if !defaults.contains(v) {
                                    defaults.push(*v);
                                }
                            }
                        }
                        "replace" => *defaults = default_args.clone(),
                        "delete" => defaults.retain(|d| !default_args.contains(d)),
                        _ => {}
                    },
                    _ => {}
                }
            }

            if let Some(min_sym) = deviate.child(StmtKeyword::MinElements).and_then(|m| m.argument) {
                mark_deviated_property(&mut touched, target, DeviatedProperty::MinElements, &path)?;
                let value: u32 = scope.ctx.dict().resolve(min_sym).parse().unwrap_or(0);
                if let Some(c) = cardinality_mut(&mut module.nodes[target.0 as usize].kind) {
                    c.min_elements = if kind == "delete" { 0 } else { value };
                }
            }

            if let Some(max_sym) = deviate.child(StmtKeyword::MaxElements).and_then(|m| m.argument) {
                mark_deviated_property(&mut touched, target, DeviatedProperty::MaxElements, &path)?;
                let text = scope.ctx.dict().resolve(max_sym).to_string();
                if let Some(c) = cardinality_mut(&mut module.nodes[target.0 as usize].kind) {
                    c.max_elements = if kind == "delete" || text == "unbounded" {
                        None
                    } else {
                        text.parse().ok()
                    };
                }
            }

            if let NodeKind::List { unique_groups, .. } = &mut module.nodes[target.0 as usize].kind {
                let groups: Vec<Vec<Symbol>> = deviate
                    .children(StmtKeyword::Unique)
                    .filter_map(|u| u.argument)
                    .map(|sym| scope.ctx.dict().resolve(sym).to_string())
                    .map(|text| {
                        text.split_whitespace()
                            .map(|s| scope.ctx.dict().insert(s))
                            .collect()
                    })
                    .collect();
                if !groups.is_empty() {
                    mark_deviated_property(&mut touched, target, DeviatedProperty::Unique, &path)?;
                    match kind.as_str() {
                        "add" => unique_groups.extend(groups),
                        "replace" => *unique_groups = groups,
                        "delete" => unique_groups.retain(|g| !groups.contains(g)),
                        _ => {}
                    }
                }
            }
        }
        module.deviated_by.push(scope.module_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;
    use yang_schema::Span;

    fn leaf_stmt(ctx: &Context, name: &str, ty: &str) -> Stmt {
        let mut leaf = Stmt::new(StmtKeyword::Leaf, Some(ctx.dict().insert(name)), Span::default());
        leaf.substatements
            .push(Stmt::new(StmtKeyword::Type, Some(ctx.dict().insert(ty)), Span::default()));
        leaf
    }

    fn parsed_module(root: Stmt) -> yang_schema::ParsedModule {
        yang_schema::ParsedModule { root }
    }

    fn test_scope(ctx: &Context) -> Ctx<'_> {
        Ctx {
            ctx,
            module_name: ctx.dict().insert("m"),
            typedefs: TypedefScope::new(),
            groupings: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn cardinality_defaults_unbounded_and_zero_min() {
        let ctx = Context::new(ContextOptions::empty());
        let scope = test_scope(&ctx);
        let stmt = Stmt::new(StmtKeyword::List, None, Span::default());
        let c = cardinality(&stmt, &scope);
        assert_eq!(c.min_elements, 0);
        assert_eq!(c.max_elements, None);
    }

    #[test]
    fn cardinality_parses_explicit_bounds() {
        let ctx = Context::new(ContextOptions::empty());
        let scope = test_scope(&ctx);
        let mut stmt = Stmt::new(StmtKeyword::List, None, Span::default());
        stmt.substatements.push(Stmt::new(
            StmtKeyword::MinElements,
            Some(ctx.dict().insert("2")),
            Span::default(),
        ));
        stmt.substatements.push(Stmt::new(
            StmtKeyword::MaxElements,
            Some(ctx.dict().insert("unbounded")),
            Span::default(),
        ));
        let c = cardinality(&stmt, &scope);
        assert_eq!(c.min_elements, 2);
        assert_eq!(c.max_elements, None);
    }

    #[test]
    fn status_flags_maps_deprecated_and_current() {
        let ctx = Context::new(ContextOptions::empty());
        let scope = test_scope(&ctx);
        let mut deprecated = Stmt::new(StmtKeyword::Leaf, None, Span::default());
        deprecated.substatements.push(Stmt::new(
            StmtKeyword::Status,
            Some(ctx.dict().insert("deprecated")),
            Span::default(),
        ));
        assert_eq!(status_flags(&deprecated, &scope), NodeFlags::STATUS_DEPRECATED);

        let current = Stmt::new(StmtKeyword::Leaf, None, Span::default());
        assert_eq!(status_flags(&current, &scope), NodeFlags::empty());
    }

    #[test]
    fn config_and_mandatory_flags_only_fire_on_matching_text() {
        let ctx = Context::new(ContextOptions::empty());
        let scope = test_scope(&ctx);
        let mut stmt = Stmt::new(StmtKeyword::Leaf, None, Span::default());
        stmt.substatements.push(Stmt::new(
            StmtKeyword::Config,
            Some(ctx.dict().insert("false")),
            Span::default(),
        ));
        stmt.substatements.push(Stmt::new(
            StmtKeyword::Mandatory,
            Some(ctx.dict().insert("true")),
            Span::default(),
        ));
        assert_eq!(config_flag(&stmt, &scope), NodeFlags::CONFIG_FALSE);
        assert_eq!(mandatory_flag(&stmt, &scope), NodeFlags::MANDATORY);

        let unset = Stmt::new(StmtKeyword::Leaf, None, Span::default());
        assert_eq!(config_flag(&unset, &scope), NodeFlags::empty());
        assert_eq!(mandatory_flag(&unset, &scope), NodeFlags::empty());
    }

    #[test]
    fn ordered_by_flag_only_fires_on_user() {
        let ctx = Context::new(ContextOptions::empty());
        let scope = test_scope(&ctx);
        let mut user_ordered = Stmt::new(StmtKeyword::List, None, Span::default());
        user_ordered.substatements.push(Stmt::new(
            StmtKeyword::OrderedBy,
            Some(ctx.dict().insert("user")),
            Span::default(),
        ));
        assert_eq!(ordered_by_flag(&user_ordered, &scope), NodeFlags::ORDERED_BY_USER);

        let mut system_ordered = Stmt::new(StmtKeyword::List, None, Span::default());
        system_ordered.substatements.push(Stmt::new(
            StmtKeyword::OrderedBy,
            Some(ctx.dict().insert("system")),
            Span::default(),
        ));
        assert_eq!(ordered_by_flag(&system_ordered, &scope), NodeFlags::empty());

        let unset = Stmt::new(StmtKeyword::List, None, Span::default());
        assert_eq!(ordered_by_flag(&unset, &scope), NodeFlags::empty());
    }

    #[test]
    fn compile_module_builds_container_with_leaf_child() {
        let ctx = Context::new(ContextOptions::empty());
        let mut root = Stmt::new(
            StmtKeyword::Module,
            Some(ctx.dict().insert("top-test")),
            Span::default(),
        );
        let mut container =
            Stmt::new(StmtKeyword::Container, Some(ctx.dict().insert("top")), Span::default());
        container.substatements.push(leaf_stmt(&ctx, "name", "string"));
        root.substatements.push(container);

        let (module, diags) = compile_module(&ctx, &parsed_module(root)).expect("compiles");
        assert!(diags.is_empty());
        assert_eq!(module.top_level.len(), 1);
        let top = module.get(module.top_level[0]);
        assert_eq!(ctx.dict().resolve(top.name), "top");
        match &top.kind {
            NodeKind::Container { children, presence } => {
                assert!(!presence);
                assert_eq!(children.len(), 1);
                let leaf = module.get(children[0]);
                assert_eq!(ctx.dict().resolve(leaf.name), "name");
            }
            other => panic!("expected container, got {other:?}"),
        }
    }

    #[test]
    fn compile_module_expands_uses_and_tags_nodes_from_grouping() {
        let ctx = Context::new(ContextOptions::empty());
        let mut root = Stmt::new(
            StmtKeyword::Module,
            Some(ctx.dict().insert("uses-test")),
            Span::default(),
        );
        let mut grouping =
            Stmt::new(StmtKeyword::Grouping, Some(ctx.dict().insert("g")), Span::default());
        grouping.substatements.push(leaf_stmt(&ctx, "inner", "string"));
        root.substatements.push(grouping);

        let uses = Stmt::new(StmtKeyword::Uses, Some(ctx.dict().insert("g")), Span::default());
        root.substatements.push(uses);

        let (module, _diags) = compile_module(&ctx, &parsed_module(root)).expect("compiles");
        assert_eq!(module.top_level.len(), 1);
        let leaf = module.get(module.top_level[0]);
        assert_eq!(ctx.dict().resolve(leaf.name), "inner");
        assert!(leaf.flags.contains(NodeFlags::FROM_USES));
    }

    #[test]
    fn compile_module_applies_augment_to_existing_container() {
        let ctx = Context::new(ContextOptions::empty());
        let mut root = Stmt::new(
            StmtKeyword::Module,
            Some(ctx.dict().insert("augment-test")),
            Span::default(),
        );
        let container = Stmt::new(StmtKeyword::Container, Some(ctx.dict().insert("top")), Span::default());
        root.substatements.push(container);

        let mut augment = Stmt::new(StmtKeyword::Augment, Some(ctx.dict().insert("/top")), Span::default());
        augment.substatements.push(leaf_stmt(&ctx, "added", "string"));
        root.substatements.push(augment);

        let (module, _diags) = compile_module(&ctx, &parsed_module(root)).expect("compiles");
        let top = module.get(module.top_level[0]);
        match &top.kind {
            NodeKind::Container { children, .. } => {
                assert_eq!(children.len(), 1);
                let added = module.get(children[0]);
                assert_eq!(ctx.dict().resolve(added.name), "added");
                assert!(added.flags.contains(NodeFlags::AUGMENTED));
            }
            other => panic!("expected container, got {other:?}"),
        }
        assert_eq!(module.augmented_by, vec![ctx.dict().insert("augment-test")]);
    }

    #[test]
    fn compile_module_applies_deviation_mandatory_false() {
        let ctx = Context::new(ContextOptions::empty());
        let mut root = Stmt::new(
            StmtKeyword::Module,
            Some(ctx.dict().insert("deviation-test")),
            Span::default(),
        );
        let mut leaf = leaf_stmt(&ctx, "name", "string");
        leaf.substatements.push(Stmt::new(
            StmtKeyword::Mandatory,
            Some(ctx.dict().insert("true")),
            Span::default(),
        ));
        root.substatements.push(leaf);

        let mut deviation =
            Stmt::new(StmtKeyword::Deviation, Some(ctx.dict().insert("/name")), Span::default());
        let mut deviate =
            Stmt::new(StmtKeyword::Deviate, Some(ctx.dict().insert("replace")), Span::default());
        deviate.substatements.push(Stmt::new(
            StmtKeyword::Mandatory,
            Some(ctx.dict().insert("false")),
            Span::default(),
        ));
        deviation.substatements.push(deviate);
        root.substatements.push(deviation);

        let (module, _diags) = compile_module(&ctx, &parsed_module(root)).expect("compiles");
        let leaf = module.get(module.top_level[0]);
        assert!(!leaf.flags.contains(NodeFlags::MANDATORY));
        assert!(leaf.flags.contains(NodeFlags::DEVIATED));
    }

    #[test]
    fn compile_module_rejects_conflicting_deviations_on_same_property() {
        let ctx = Context::new(ContextOptions::empty());
        let mut root = Stmt::new(
            StmtKeyword::Module,
            Some(ctx.dict().insert("conflict-test")),
            Span::default(),
        );
        root.substatements.push(leaf_stmt(&ctx, "name", "string"));

        let mut deviation =
            Stmt::new(StmtKeyword::Deviation, Some(ctx.dict().insert("/name")), Span::default());
        for value in ["false", "true"] {
            let mut deviate =
                Stmt::new(StmtKeyword::Deviate, Some(ctx.dict().insert("replace")), Span::default());
            deviate.substatements.push(Stmt::new(
                StmtKeyword::Config,
                Some(ctx.dict().insert(value)),
                Span::default(),
            ));
            deviation.substatements.push(deviate);
        }
        root.substatements.push(deviation);

        let err = compile_module(&ctx, &parsed_module(root)).expect_err("must reject conflict");
        assert!(matches!(err, SchemaError::ConflictingDeviation(_, "config")));
    }

    #[test]
    fn resolve_schema_path_matches_by_plain_child_name() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let mut module = CompiledModule::new();
        let ty = Rc::new(
            types::compile_type(
                &ctx,
                &Stmt::new(StmtKeyword::Type, Some(ctx.dict().insert("string")), Span::default()),
                &TypedefScope::new(),
                &module.identities,
            )
            .unwrap(),
        );
        let leaf = module.push(CompiledNode {
            parent: None,
            name: ctx.dict().insert("name"),
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Leaf {
                ty,
                default: None,
                units: None,
            },
        });
        let top = module.push(CompiledNode {
            parent: None,
            name: ctx.dict().insert("top"),
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Container {
                children: vec![leaf],
                presence: false,
            },
        });
        module.top_level.push(top);

        let found = resolve_schema_path(&module, &module.top_level.clone(), "/m:top/name", &ctx);
        assert_eq!(found, Some(leaf));
        let missing = resolve_schema_path(&module, &module.top_level.clone(), "/top/nope", &ctx);
        assert_eq!(missing, None);
    }
}
