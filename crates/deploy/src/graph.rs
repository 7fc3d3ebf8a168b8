//! Deployment ordering.

use std::collections::{BTreeSet, HashMap};

use crate::{errors::DeployError, topology::ContractSpec};

/// Order specs so that every spec comes after the specs it references.
///
/// Kahn's algorithm over the reference graph. Among specs that are ready at the same
/// time, the one declared first is emitted first, so the order is deterministic and
/// matches declaration order whenever declaration order is already valid.
pub fn deployment_order(specs: &[ContractSpec]) -> Result<Vec<ContractSpec>, DeployError> {
    let mut index = HashMap::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if index.insert(spec.name.as_str(), i).is_some() {
            return Err(DeployError::config(format!(
                "contract `{}` is declared twice",
                spec.name
            )));
        }
    }

    let mut in_degree = vec![0usize; specs.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    for (i, spec) in specs.iter().enumerate() {
        let mut deps = BTreeSet::new();
        for name in spec.dependencies() {
            let dep = *index.get(name).ok_or_else(|| DeployError::UnresolvedDependency {
                name: name.to_string(),
            })?;
            deps.insert(dep);
        }
        in_degree[i] = deps.len();
        for dep in deps {
            dependents[dep].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..specs.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(specs.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(specs[next].clone());
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if ordered.len() < specs.len() {
        let members = specs
            .iter()
            .zip(&in_degree)
            .filter(|(_, degree)| **degree > 0)
            .map(|(spec, _)| spec.name.clone())
            .collect();
        return Err(DeployError::CyclicDependency { members });
    }

    tracing::debug!(
        order = ?ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "Resolved deployment order"
    );

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{RunConfiguration, tests::SAMPLE_CONFIG},
        topology::{ConstructorArg, ContractSource, protocol_specs},
    };

    fn spec(name: &str, deps: &[&str]) -> ContractSpec {
        ContractSpec {
            name: name.to_string(),
            source: ContractSource::Deploy {
                artifact: name.to_string(),
                args: deps
                    .iter()
                    .map(|d| ConstructorArg::Contract(d.to_string()))
                    .collect(),
            },
        }
    }

    fn names(specs: &[ContractSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_every_spec_follows_its_dependencies() {
        let config = RunConfiguration::from_toml(SAMPLE_CONFIG).unwrap();
        let ordered = deployment_order(&protocol_specs(&config)).unwrap();
        let position: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        assert_eq!(ordered.len(), 21);
        for spec in &ordered {
            for dep in spec.dependencies() {
                assert!(
                    position[dep] < position[spec.name.as_str()],
                    "{} is ordered before its dependency {dep}",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let specs = vec![spec("C", &["A"]), spec("B", &[]), spec("A", &[])];
        let ordered = deployment_order(&specs).unwrap();
        assert_eq!(names(&ordered), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let specs = vec![
            spec("Free", &[]),
            spec("A", &["B"]),
            spec("B", &["C"]),
            spec("C", &["A"]),
        ];
        let err = deployment_order(&specs).unwrap_err();
        assert_eq!(
            err,
            DeployError::CyclicDependency {
                members: vec!["A".to_string(), "B".to_string(), "C".to_string()]
            }
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let err = deployment_order(&[spec("A", &["A"])]).unwrap_err();
        assert!(matches!(err, DeployError::CyclicDependency { .. }));
    }

    #[test]
    fn test_unknown_reference_is_unresolved() {
        let err = deployment_order(&[spec("Router", &["PairFactory"])]).unwrap_err();
        assert_eq!(
            err,
            DeployError::UnresolvedDependency {
                name: "PairFactory".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_declaration_is_rejected() {
        let err = deployment_order(&[spec("A", &[]), spec("A", &[])]).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }
}
