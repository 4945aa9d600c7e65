//! WT-003: Dependency DAG over a synthesized template.
//!
//! Edges come from `DependsOn` plus every `Ref`/`Fn::GetAtt` inside a
//! resource's properties. Computes a deploy order using Kahn's algorithm
//! with deterministic (alphabetical) tie-breaking, rejecting dangling
//! references and cycles.

use super::error::SynthError;
use super::template::{collect_references, is_pseudo_parameter, Template};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Resource IDs a resource must be created after.
pub fn resource_dependencies(template: &Template, logical_id: &str) -> Result<BTreeSet<String>, SynthError> {
    let mut deps = BTreeSet::new();
    let Some(resource) = template.resources.get(logical_id) else {
        return Ok(deps);
    };

    let mut refs = Vec::new();
    collect_references(&resource.properties, &mut refs);
    refs.extend(resource.depends_on.iter().cloned());

    for target in refs {
        if is_pseudo_parameter(&target) || template.parameters.contains_key(&target) {
            continue;
        }
        if !template.resources.contains_key(&target) {
            return Err(SynthError::DanglingReference {
                from: logical_id.to_string(),
                target,
            });
        }
        deps.insert(target);
    }
    Ok(deps)
}

/// Check that outputs only reference known resources.
pub fn check_outputs(template: &Template) -> Result<(), SynthError> {
    for (id, output) in &template.outputs {
        let mut refs = Vec::new();
        collect_references(&output.value, &mut refs);
        for target in refs {
            if is_pseudo_parameter(&target)
                || template.parameters.contains_key(&target)
                || template.resources.contains_key(&target)
            {
                continue;
            }
            return Err(SynthError::DanglingReference {
                from: id.clone(),
                target,
            });
        }
    }
    Ok(())
}

/// Build a topological deploy order from resource references.
/// Uses Kahn's algorithm with alphabetical tie-breaking for determinism.
pub fn build_deploy_order(template: &Template) -> Result<Vec<String>, SynthError> {
    let resource_ids: Vec<String> = template.resources.keys().cloned().collect();
    let mut in_degree: HashMap<String, usize> = HashMap::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for id in &resource_ids {
        in_degree.insert(id.clone(), 0);
        adjacency.insert(id.clone(), Vec::new());
    }

    for id in &resource_ids {
        for dep in resource_dependencies(template, id)? {
            if dep == *id {
                return Err(SynthError::Cycle(id.clone()));
            }
            adjacency.entry(dep).or_default().push(id.clone());
            *in_degree.entry(id.clone()).or_insert(0) += 1;
        }
    }

    // Kahn's algorithm with sorted tie-breaking
    let mut zero_degree: Vec<String> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| id.clone())
        .collect();
    zero_degree.sort();
    let mut queue: VecDeque<String> = zero_degree.into_iter().collect();

    let mut order = Vec::with_capacity(resource_ids.len());
    while let Some(current) = queue.pop_front() {
        let mut next_ready: Vec<String> = Vec::new();
        if let Some(neighbors) = adjacency.get(&current) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor.clone());
                    }
                }
            }
        }
        order.push(current);
        next_ready.sort();
        queue.extend(next_ready);
    }

    if order.len() != resource_ids.len() {
        let ordered: HashSet<&String> = order.iter().collect();
        let mut cycle_members: Vec<&str> = resource_ids
            .iter()
            .filter(|id| !ordered.contains(id))
            .map(|s| s.as_str())
            .collect();
        cycle_members.sort();
        return Err(SynthError::Cycle(cycle_members.join(", ")));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::{get_att, reference, CfnResource, Output, Parameter};
    use serde_json::json;

    fn add(t: &mut Template, id: &str, props: serde_json::Value) {
        t.resources
            .insert(id.to_string(), CfnResource::new("AWS::Test::Thing", props));
    }

    #[test]
    fn test_wt003_linear() {
        let mut t = Template::new(None);
        add(&mut t, "c", json!({"X": reference("b")}));
        add(&mut t, "b", json!({"X": get_att("a", "Arn")}));
        add(&mut t, "a", json!({}));
        assert_eq!(build_deploy_order(&t).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_wt003_parallel_alphabetical() {
        let mut t = Template::new(None);
        add(&mut t, "beta", json!({}));
        add(&mut t, "alpha", json!({}));
        assert_eq!(build_deploy_order(&t).unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_wt003_diamond() {
        let mut t = Template::new(None);
        add(&mut t, "top", json!({}));
        add(&mut t, "left", json!({"A": reference("top")}));
        add(&mut t, "right", json!({"A": reference("top")}));
        add(
            &mut t,
            "bottom",
            json!({"A": reference("left"), "B": reference("right")}),
        );
        let order = build_deploy_order(&t).unwrap();
        assert_eq!(order, vec!["top", "left", "right", "bottom"]);
    }

    #[test]
    fn test_wt003_depends_on_edge() {
        let mut t = Template::new(None);
        add(&mut t, "a", json!({}));
        t.resources.insert(
            "b".to_string(),
            CfnResource::new("AWS::Test::Thing", json!({})).depends_on("z"),
        );
        add(&mut t, "z", json!({}));
        assert_eq!(build_deploy_order(&t).unwrap(), vec!["a", "z", "b"]);
    }

    #[test]
    fn test_wt003_pseudo_and_parameters_ignored() {
        let mut t = Template::new(None);
        t.parameters.insert(
            "Ami".to_string(),
            Parameter {
                parameter_type: "String".to_string(),
                default: None,
            },
        );
        add(
            &mut t,
            "a",
            json!({"R": reference("AWS::Region"), "I": reference("Ami")}),
        );
        assert_eq!(build_deploy_order(&t).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_wt003_dangling() {
        let mut t = Template::new(None);
        add(&mut t, "a", json!({"X": reference("ghost")}));
        let err = build_deploy_order(&t).unwrap_err();
        assert!(matches!(err, SynthError::DanglingReference { .. }));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_wt003_cycle() {
        let mut t = Template::new(None);
        add(&mut t, "a", json!({"X": reference("b")}));
        add(&mut t, "b", json!({"X": reference("a")}));
        let err = build_deploy_order(&t).unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_wt003_self_reference() {
        let mut t = Template::new(None);
        add(&mut t, "a", json!({"X": reference("a")}));
        assert!(matches!(
            build_deploy_order(&t).unwrap_err(),
            SynthError::Cycle(_)
        ));
    }

    #[test]
    fn test_wt003_outputs_checked() {
        let mut t = Template::new(None);
        add(&mut t, "a", json!({}));
        t.outputs.insert(
            "Out".to_string(),
            Output {
                value: get_att("missing", "DNSName"),
                description: None,
            },
        );
        assert!(check_outputs(&t).is_err());
        t.outputs["Out"].value = get_att("a", "DNSName");
        assert!(check_outputs(&t).is_ok());
    }
}
