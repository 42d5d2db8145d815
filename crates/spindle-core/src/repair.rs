//! Structural repairs applied to a specification graph while a saved task
//! tree is being loaded.
//!
//! A saved execution can reference clone specs that the loaded graph does
//! not contain yet (multi-instance expansion, parallel-gateway naming).
//! Each repair is a standalone function with a narrow contract:
//!
//! | repair                    | input                         | output                              |
//! |---------------------------|-------------------------------|-------------------------------------|
//! | `splice_suffixed_clone`   | template, clone name, suffix  | named clone between template and its downstream nodes |
//! | `extend_runtime_fan_out`  | resolved spec, runtime count  | detached clone on the feeder's fan-out |
//! | `clone_gateway`           | bare spec, compound name      | named clone with no edges (flagged) |
//!
//! The first two leave the graph edge-consistent (`check_edges` passes
//! afterwards if it passed before). Every repair is recorded on the graph.

use spindle_types::error::SpecError;
use spindle_types::graph::{SpecRef, SpecRepair, WorkflowSpec};

// ---------------------------------------------------------------------------
// Name parsing
// ---------------------------------------------------------------------------

/// Split `Foo_2` into `("Foo", 2)`. Names without a non-empty base and a
/// numeric last segment return `None`.
pub fn parse_suffix(name: &str) -> Option<(&str, u64)> {
    let (base, tail) = name.rsplit_once('_')?;
    if base.is_empty() || tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, tail.parse().ok()?))
}

/// Name of the spec that clone `n` of `base` is copied from: the base
/// itself for `n == 0`, otherwise clone `n - 1`.
pub fn predecessor_name(base: &str, n: u64) -> String {
    match n {
        0 => base.to_string(),
        n => format!("{base}_{}", n - 1),
    }
}

/// Which end of a parallel gateway a compound name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnd {
    Start,
    End,
}

/// Split `Gateway_<id>_<name>_start|end` into `(<name>, end)`.
pub fn parse_gateway(name: &str) -> Option<(&str, GatewayEnd)> {
    let rest = name.strip_prefix("Gateway_")?;
    let (_id, rest) = rest.split_once('_')?;
    let (bare, end) = if let Some(bare) = rest.strip_suffix("_start") {
        (bare, GatewayEnd::Start)
    } else if let Some(bare) = rest.strip_suffix("_end") {
        (bare, GatewayEnd::End)
    } else {
        return None;
    };
    (!bare.is_empty()).then_some((bare, end))
}

// ---------------------------------------------------------------------------
// Repairs
// ---------------------------------------------------------------------------

/// Clone `template` as `name` (clone number `n`) and splice it in after
/// the template.
///
/// Before: `template -> d1, d2`. After: `template -> clone -> d1, d2`. The
/// downstream nodes' inputs point at the clone instead of the template.
/// Fails with `DuplicateName` if `name` is already registered.
pub fn splice_suffixed_clone(
    spec: &mut WorkflowSpec,
    template: SpecRef,
    name: &str,
    n: u64,
) -> Result<SpecRef, SpecError> {
    let mut clone = spec[template].clone();
    clone.name = name.to_string();
    clone.id = clone.id.as_ref().map(|id| id.suffixed(n as usize));
    clone.inputs = vec![template];
    let downstream = std::mem::take(&mut spec[template].outputs);
    clone.outputs = downstream.clone();

    let handle = match spec.insert(clone) {
        Ok(handle) => handle,
        Err(err) => {
            spec[template].outputs = downstream;
            return Err(err);
        }
    };
    spec[template].outputs = vec![handle];
    for next in downstream {
        for input in spec[next].inputs.iter_mut() {
            if *input == template {
                *input = handle;
            }
        }
    }

    let template_name = spec[template].name.clone();
    tracing::debug!(clone = %name, template = %template_name, "spliced numbered clone into spec graph");
    spec.record_repair(SpecRepair::SuffixedClone {
        name: name.to_string(),
        template: template_name,
    });
    Ok(handle)
}

/// Add one more fan-out clone of `resolved` when a saved task ran more
/// instances than the graph has branches for.
///
/// Applies only when `runtimes > 1`, `resolved` has at least two inputs
/// and one output, and its second input (the feeder) has fewer outputs
/// than `runtimes`. The clone is detached (it shares the template's name),
/// wired `feeder -> clone -> outputs[0]`, and returned. Otherwise `None`.
pub fn extend_runtime_fan_out(
    spec: &mut WorkflowSpec,
    resolved: SpecRef,
    runtimes: u64,
) -> Option<SpecRef> {
    if runtimes <= 1 {
        return None;
    }
    let template = &spec[resolved];
    let feeder = *template.inputs.get(1)?;
    let target = *template.outputs.first()?;
    if spec[feeder].outputs.len() as u64 >= runtimes {
        return None;
    }

    let mut clone = template.clone();
    clone.id = clone.id.as_ref().map(|id| id.appended(runtimes - 1));
    clone.inputs = vec![feeder];
    clone.outputs = vec![target];
    let name = clone.name.clone();
    let id = clone.id.clone();

    let handle = spec.insert_detached(clone);
    spec[feeder].outputs.push(handle);
    spec[target].inputs.push(handle);

    tracing::debug!(spec = %name, runtimes, "added fan-out clone for saved runtime count");
    spec.record_repair(SpecRepair::RuntimeFanOut { name, id, runtimes });
    Some(handle)
}

/// Clone the bare spec under its compound gateway name.
///
/// The clone has no edges: which neighbours a gateway start or end
/// should attach to cannot be recovered from the name alone. The repair
/// is recorded as flagged and logged at warn.
pub fn clone_gateway(spec: &mut WorkflowSpec, bare: SpecRef, name: &str) -> Result<SpecRef, SpecError> {
    let mut clone = spec[bare].clone();
    clone.name = name.to_string();
    clone.inputs.clear();
    clone.outputs.clear();
    let bare_name = spec[bare].name.clone();
    let handle = spec.insert(clone)?;

    tracing::warn!(
        clone = %name,
        bare = %bare_name,
        "cloned gateway spec without edges; review before replaying this workflow"
    );
    spec.record_repair(SpecRepair::GatewayClone {
        name: name.to_string(),
        bare: bare_name,
    });
    Ok(handle)
}

/// Resolve `name`, repairing the graph if the name is a numbered clone or
/// a gateway start/end that the graph does not contain yet.
///
/// Order: exact lookup, numbered clone, gateway clone. A numbered clone
/// is built from the nearest existing clone below it, creating the
/// clones in between; when more than `max_gap` of them would be needed
/// the name is left unresolved. `Ok(None)` when nothing matches.
pub fn resolve_or_repair(
    spec: &mut WorkflowSpec,
    name: &str,
    max_gap: u64,
) -> Result<Option<SpecRef>, SpecError> {
    if let Some(handle) = spec.by_name(name) {
        return Ok(Some(handle));
    }

    if let Some((base, n)) = parse_suffix(name)
        && resolve_or_repair(spec, base, max_gap)?.is_some()
    {
        let Some((first, mut template)) = nearest_clone(spec, base, n, max_gap) else {
            tracing::debug!(spec = %name, max_gap, "numbered clone too far from an existing clone");
            return Ok(None);
        };
        for i in first..n {
            template = splice_suffixed_clone(spec, template, &format!("{base}_{i}"), i)?;
        }
        return splice_suffixed_clone(spec, template, name, n).map(Some);
    }

    if let Some((bare, _)) = parse_gateway(name)
        && let Some(handle) = spec.by_name(bare)
    {
        return clone_gateway(spec, handle, name).map(Some);
    }

    Ok(None)
}

/// Walk down from clone `n` of `base` to the nearest spec that exists,
/// giving up after `max_gap` missing clones. Returns the suffix of the
/// first clone to build and the spec to copy it from.
fn nearest_clone(spec: &WorkflowSpec, base: &str, n: u64, max_gap: u64) -> Option<(u64, SpecRef)> {
    let mut first = n;
    loop {
        if let Some(handle) = spec.by_name(&predecessor_name(base, first)) {
            return Some((first, handle));
        }
        if first == 0 || n - first >= max_gap {
            return None;
        }
        first -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::config::DEFAULT_MAX_CLONE_GAP as GAP;
    use spindle_types::spec::{SpecId, TaskSpec};

    /// `Start -> Foo -> Join`, with numeric ids.
    fn fan_graph() -> (WorkflowSpec, SpecRef, SpecRef) {
        let mut spec = WorkflowSpec::new("fan");
        let foo = spec.add(TaskSpec::simple("Foo")).unwrap();
        let join = spec.add(TaskSpec::simple("Join")).unwrap();
        spec.connect(spec.start(), foo);
        spec.connect(foo, join);
        (spec, foo, join)
    }

    // -----------------------------------------------------------------------
    // Name parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_suffix() {
        assert_eq!(parse_suffix("Foo_2"), Some(("Foo", 2)));
        assert_eq!(parse_suffix("Task_A_0"), Some(("Task_A", 0)));
        assert_eq!(parse_suffix("Foo"), None);
        assert_eq!(parse_suffix("Foo_"), None);
        assert_eq!(parse_suffix("_3"), None);
        assert_eq!(parse_suffix("Foo_x1"), None);
    }

    #[test]
    fn test_predecessor_name() {
        assert_eq!(predecessor_name("Foo", 0), "Foo");
        assert_eq!(predecessor_name("Foo", 1), "Foo_0");
        assert_eq!(predecessor_name("Foo", 3), "Foo_2");
    }

    #[test]
    fn test_parse_gateway() {
        assert_eq!(
            parse_gateway("Gateway_7_Approve_start"),
            Some(("Approve", GatewayEnd::Start))
        );
        assert_eq!(
            parse_gateway("Gateway_7_Check_Credit_end"),
            Some(("Check_Credit", GatewayEnd::End))
        );
        assert_eq!(parse_gateway("Gateway_7_start"), None);
        assert_eq!(parse_gateway("Gateway_7_Approve_middle"), None);
        assert_eq!(parse_gateway("Approve_start"), None);
    }

    // -----------------------------------------------------------------------
    // Numbered clones
    // -----------------------------------------------------------------------

    #[test]
    fn test_splice_places_clone_between_template_and_downstream() {
        let (mut spec, foo, join) = fan_graph();
        let clone = splice_suffixed_clone(&mut spec, foo, "Foo_0", 0).unwrap();

        assert_eq!(spec.by_name("Foo_0"), Some(clone));
        assert_eq!(spec[foo].outputs, vec![clone]);
        assert_eq!(spec[clone].inputs, vec![foo]);
        assert_eq!(spec[clone].outputs, vec![join]);
        assert_eq!(spec[join].inputs, vec![clone]);
        assert_eq!(spec[clone].id, Some(SpecId::Text("2_0".to_string())));
        spec.check_edges().unwrap();
    }

    #[test]
    fn test_splice_rejects_existing_name_and_leaves_graph_intact() {
        let (mut spec, foo, join) = fan_graph();
        let err = splice_suffixed_clone(&mut spec, foo, "Join", 1).unwrap_err();
        assert!(matches!(err, SpecError::DuplicateName(_)));
        assert_eq!(spec[foo].outputs, vec![join]);
        assert!(spec.repairs().is_empty());
    }

    #[test]
    fn test_resolve_builds_missing_intermediate_clones() {
        let (mut spec, foo, join) = fan_graph();
        let foo_2 = resolve_or_repair(&mut spec, "Foo_2", GAP).unwrap().unwrap();

        let foo_0 = spec.by_name("Foo_0").unwrap();
        let foo_1 = spec.by_name("Foo_1").unwrap();
        assert_eq!(spec[foo].outputs, vec![foo_0]);
        assert_eq!(spec[foo_0].outputs, vec![foo_1]);
        assert_eq!(spec[foo_1].outputs, vec![foo_2]);
        assert_eq!(spec[foo_2].outputs, vec![join]);
        assert_eq!(spec[foo_2].id, Some(SpecId::Text("2_2".to_string())));
        assert_eq!(spec.repairs().len(), 3);
        spec.check_edges().unwrap();
    }

    #[test]
    fn test_resolve_existing_clone_is_idempotent() {
        let (mut spec, _, _) = fan_graph();
        let first = resolve_or_repair(&mut spec, "Foo_2", GAP).unwrap();
        let named = spec.named_len();
        let second = resolve_or_repair(&mut spec, "Foo_2", GAP).unwrap();
        assert_eq!(first, second);
        assert_eq!(spec.named_len(), named);
        assert_eq!(spec.repairs().len(), 3);
    }

    #[test]
    fn test_resolve_gives_up_past_clone_gap() {
        let (mut spec, _, _) = fan_graph();
        let named = spec.named_len();
        assert_eq!(resolve_or_repair(&mut spec, "Foo_200000", GAP).unwrap(), None);
        assert_eq!(resolve_or_repair(&mut spec, "Foo_18446744073709551615", GAP).unwrap(), None);
        assert_eq!(spec.named_len(), named);
        assert!(spec.repairs().is_empty());
    }

    #[test]
    fn test_zero_gap_clones_only_from_immediate_predecessor() {
        let (mut spec, _, _) = fan_graph();
        assert_eq!(resolve_or_repair(&mut spec, "Foo_1", 0).unwrap(), None);
        assert!(resolve_or_repair(&mut spec, "Foo_0", 0).unwrap().is_some());
        assert!(resolve_or_repair(&mut spec, "Foo_1", 0).unwrap().is_some());
        assert_eq!(spec.repairs().len(), 2);
    }

    #[test]
    fn test_gap_limit_is_inclusive() {
        let (mut spec, _, _) = fan_graph();
        // Foo_3 needs Foo_0..Foo_2 first: three intermediate clones.
        assert_eq!(resolve_or_repair(&mut spec, "Foo_3", 2).unwrap(), None);
        assert!(resolve_or_repair(&mut spec, "Foo_3", 3).unwrap().is_some());
        assert_eq!(spec.repairs().len(), 4);
        spec.check_edges().unwrap();
    }

    #[test]
    fn test_resolve_unknown_base_is_none() {
        let (mut spec, _, _) = fan_graph();
        assert_eq!(resolve_or_repair(&mut spec, "Ghost", GAP).unwrap(), None);
        assert_eq!(resolve_or_repair(&mut spec, "Ghost_3", GAP).unwrap(), None);
        assert!(spec.repairs().is_empty());
    }

    // -----------------------------------------------------------------------
    // Runtime fan-out
    // -----------------------------------------------------------------------

    /// `Start -> Split`, `Split -> Item`, `Start -> Item`, `Item -> Done`.
    /// `Item`'s second input is the feeder `Split`.
    fn multi_instance_graph() -> (WorkflowSpec, SpecRef, SpecRef, SpecRef) {
        let mut spec = WorkflowSpec::new("mi");
        let split = spec.add(TaskSpec::simple("Split")).unwrap();
        let item = spec.add(TaskSpec::simple("Item")).unwrap();
        let done = spec.add(TaskSpec::simple("Done")).unwrap();
        spec.connect(spec.start(), split);
        spec.connect(spec.start(), item);
        spec.connect(split, item);
        spec.connect(item, done);
        (spec, split, item, done)
    }

    #[test]
    fn test_fan_out_adds_detached_clone() {
        let (mut spec, split, item, done) = multi_instance_graph();
        let clone = extend_runtime_fan_out(&mut spec, item, 3).unwrap();

        assert_eq!(spec[clone].name, "Item");
        assert_eq!(spec.by_name("Item"), Some(item));
        assert_eq!(spec[clone].id, Some(SpecId::Text("3_2".to_string())));
        assert_eq!(spec[clone].inputs, vec![split]);
        assert_eq!(spec[clone].outputs, vec![done]);
        assert_eq!(spec[split].outputs, vec![item, clone]);
        assert!(spec[done].inputs.contains(&clone));
        spec.check_edges().unwrap();
    }

    #[test]
    fn test_fan_out_stops_once_feeder_is_wide_enough() {
        let (mut spec, split, item, _) = multi_instance_graph();
        assert!(extend_runtime_fan_out(&mut spec, item, 3).is_some());
        assert!(extend_runtime_fan_out(&mut spec, item, 3).is_some());
        assert_eq!(extend_runtime_fan_out(&mut spec, item, 3), None);
        assert_eq!(spec[split].outputs.len(), 3);
    }

    #[test]
    fn test_fan_out_preconditions() {
        let (mut spec, _, item, _) = multi_instance_graph();
        assert_eq!(extend_runtime_fan_out(&mut spec, item, 1), None);

        let (mut spec, foo, _) = fan_graph();
        assert_eq!(extend_runtime_fan_out(&mut spec, foo, 4), None);
        assert!(spec.repairs().is_empty());
    }

    // -----------------------------------------------------------------------
    // Gateway clones
    // -----------------------------------------------------------------------

    #[test]
    fn test_gateway_clone_is_edgeless_and_flagged() {
        let (mut spec, foo, _) = fan_graph();
        let clone = resolve_or_repair(&mut spec, "Gateway_9_Foo_end", GAP).unwrap().unwrap();

        assert_ne!(clone, foo);
        assert_eq!(spec.by_name("Gateway_9_Foo_end"), Some(clone));
        assert!(spec[clone].inputs.is_empty());
        assert!(spec[clone].outputs.is_empty());
        assert_eq!(spec.repairs().len(), 1);
        assert!(spec.repairs()[0].is_flagged());
        spec.check_edges().unwrap();
    }

    #[test]
    fn test_gateway_with_unknown_bare_name_is_none() {
        let (mut spec, _, _) = fan_graph();
        assert_eq!(resolve_or_repair(&mut spec, "Gateway_9_Bar_start", GAP).unwrap(), None);
    }
}
