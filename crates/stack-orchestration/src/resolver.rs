//! Dependency resolution for stack deployment order
//!
//! Service names are resolved once into an index-based graph, then a
//! topological sort produces the deployment order. Ties among services
//! with no ordering constraint break by the declared `order` hint, then
//! by name, so the result is deterministic.

use crate::Error;
use stack_store::ServiceDefinition;
use std::collections::HashMap;

/// Index-based view of the dependency graph
struct DependencyGraph<'a> {
    services: &'a [ServiceDefinition],
    /// dependents[i] = indices of services that depend on service i
    dependents: Vec<Vec<usize>>,
    /// in_degree[i] = number of unsatisfied dependencies of service i
    in_degree: Vec<usize>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph, validating every `depends_on` reference
    fn build(services: &'a [ServiceDefinition]) -> Result<Self, Error> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(services.len());
        for (i, service) in services.iter().enumerate() {
            index.insert(service.name.as_str(), i);
        }

        let mut dependents = vec![Vec::new(); services.len()];
        let mut in_degree = vec![0usize; services.len()];

        for (i, service) in services.iter().enumerate() {
            for dep in &service.depends_on {
                let Some(&dep_idx) = index.get(dep.as_str()) else {
                    return Err(Error::UnknownDependency {
                        service: service.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if dep_idx == i {
                    return Err(Error::DependencyCycle {
                        services: vec![service.name.clone()],
                    });
                }
                dependents[dep_idx].push(i);
                in_degree[i] += 1;
            }
        }

        Ok(Self {
            services,
            dependents,
            in_degree,
        })
    }

    /// Kahn's topological sort with a deterministic tie-break
    fn sort(mut self) -> Result<Vec<String>, Error> {
        let mut ready: Vec<usize> = (0..self.services.len())
            .filter(|&i| self.in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.services.len());

        while !ready.is_empty() {
            // Lowest (order, name) among currently-ready services runs next
            let pos = ready
                .iter()
                .enumerate()
                .min_by_key(|&(_, &i)| (self.services[i].order, self.services[i].name.as_str()))
                .map(|(pos, _)| pos)
                .unwrap();
            let next = ready.swap_remove(pos);
            result.push(self.services[next].name.clone());

            for &dependent in &self.dependents[next] {
                self.in_degree[dependent] -= 1;
                if self.in_degree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if result.len() != self.services.len() {
            return Err(Error::DependencyCycle {
                services: self.cycle_members(),
            });
        }

        Ok(result)
    }

    /// Names of the services actually on a cycle
    ///
    /// When the sort stalls, the residual nodes are the cycle members
    /// plus everything downstream of them. The downstream part is
    /// acyclic, so repeatedly peeling residual nodes with no residual
    /// dependents leaves exactly the cycle members.
    fn cycle_members(&self) -> Vec<String> {
        let mut residual: Vec<bool> = self.in_degree.iter().map(|&d| d > 0).collect();

        loop {
            let mut changed = false;
            for i in 0..self.services.len() {
                if residual[i] && !self.dependents[i].iter().any(|&d| residual[d]) {
                    residual[i] = false;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut names: Vec<String> = residual
            .iter()
            .enumerate()
            .filter(|&(_, &on_cycle)| on_cycle)
            .map(|(i, _)| self.services[i].name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Resolve the deployment order for a set of service definitions
///
/// Returns the service names in an order where every service appears after
/// all members of its `depends_on`. Fails with [`Error::UnknownDependency`]
/// or [`Error::DependencyCycle`] before any device is touched.
pub fn resolve_order(services: &[ServiceDefinition]) -> Result<Vec<String>, Error> {
    DependencyGraph::build(services)?.sort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn service(name: &str, order: i64, deps: &[&str]) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            template: format!("{name}.j2"),
            devices: BTreeSet::from(["sw1".to_string()]),
            order,
            variables: Default::default(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let services = vec![
            service("bgp-peering", 0, &["interfaces", "prefix-lists"]),
            service("interfaces", 0, &["vlans"]),
            service("prefix-lists", 0, &[]),
            service("vlans", 0, &[]),
        ];

        let order = resolve_order(&services).unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "vlans") < position(&order, "interfaces"));
        assert!(position(&order, "interfaces") < position(&order, "bgp-peering"));
        assert!(position(&order, "prefix-lists") < position(&order, "bgp-peering"));
    }

    #[test]
    fn test_order_hint_breaks_ties() {
        let services = vec![
            service("ntp", 30, &[]),
            service("snmp", 10, &[]),
            service("syslog", 20, &[]),
        ];

        let order = resolve_order(&services).unwrap();
        assert_eq!(order, vec!["snmp", "syslog", "ntp"]);
    }

    #[test]
    fn test_name_breaks_equal_order_hints() {
        let services = vec![
            service("bravo", 0, &[]),
            service("alpha", 0, &[]),
            service("charlie", 0, &[]),
        ];

        let order = resolve_order(&services).unwrap();
        assert_eq!(order, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_dependency_overrides_order_hint() {
        // base sorts after leaf by hint, but leaf depends on base
        let services = vec![service("base", 99, &[]), service("leaf", 1, &["base"])];

        let order = resolve_order(&services).unwrap();
        assert_eq!(order, vec!["base", "leaf"]);
    }

    #[test]
    fn test_cycle_detected() {
        let services = vec![
            service("a", 0, &["b"]),
            service("b", 0, &["a"]),
            service("c", 0, &[]),
        ];

        let err = resolve_order(&services).unwrap_err();
        match err {
            Error::DependencyCycle { services } => {
                assert_eq!(services, vec!["a", "b"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_error_excludes_downstream_dependents() {
        // c depends on the a<->b cycle but is not part of it
        let services = vec![
            service("a", 0, &["b"]),
            service("b", 0, &["a"]),
            service("c", 0, &["a"]),
        ];

        let err = resolve_order(&services).unwrap_err();
        match err {
            Error::DependencyCycle { services } => {
                assert_eq!(services, vec!["a", "b"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let services = vec![service("a", 0, &["a"])];

        let err = resolve_order(&services).unwrap_err();
        assert!(matches!(err, Error::DependencyCycle { .. }));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let services = vec![service("a", 0, &["ghost"])];

        let err = resolve_order(&services).unwrap_err();
        match err {
            Error::UnknownDependency {
                service,
                dependency,
            } => {
                assert_eq!(service, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected unknown dependency error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_stack_resolves_to_empty_order() {
        assert!(resolve_order(&[]).unwrap().is_empty());
    }
}
