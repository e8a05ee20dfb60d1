use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;

use validator::{Validate, ValidationErrors};

use crate::document::Document;
use crate::template::Template;
use crate::value::{is_pseudo_parameter, Intrinsic, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    Parameter,
    Resource,
    Output,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::Resource => "resource",
            DeclarationKind::Output => "output",
        })
    }
}

/// Declaration holding the offending value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Container {
    Resource(String),
    Output(String),
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Resource(name) => write!(f, "resource `{name}`"),
            Container::Output(name) => write!(f, "output `{name}`"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("Duplicate {kind} name `{name}`")]
    DuplicateName { kind: DeclarationKind, name: String },

    #[error("Unresolved reference `{reference}` in {container}")]
    UnresolvedReference {
        reference: String,
        container: Container,
    },

    #[error("Cyclic dependency between resources: {}", cycle_path(.resources))]
    CyclicDependency { resources: Vec<String> },

    #[error("Invalid property type in {container} at `{path}`: {reason}")]
    InvalidPropertyType {
        container: Container,
        path: String,
        reason: String,
    },

    #[error("Invalid {kind} declaration `{name}`: {reason}")]
    InvalidDeclaration {
        kind: DeclarationKind,
        name: String,
        reason: String,
    },
}

fn cycle_path(resources: &[String]) -> String {
    let mut path = resources.join(" -> ");
    if let Some(first) = resources.first() {
        path.push_str(" -> ");
        path.push_str(first);
    }
    path
}

/// Validate the declarations of a template and derive the realization order
///
/// Every `Ref`, `Fn::GetAtt` and `DependsOn` must point at a declared name,
/// intrinsic arguments must have the right shape and the resource graph must
/// be acyclic. Intrinsics themselves are left for CloudFormation to evaluate.
pub fn assemble(template: &Template) -> Result<Document, AssemblyError> {
    let scope = Scope::new(template)?;
    validate_declarations(template)?;

    let mut dependencies: Vec<BTreeSet<usize>> = Vec::with_capacity(template.resources.len());
    for resource in &template.resources {
        let container = Container::Resource(resource.name.clone());
        let mut edges = BTreeSet::new();

        for (key, value) in &resource.properties {
            scope.check(value, &container, &format!("Properties.{key}"), &mut edges)?;
        }

        for target in &resource.depends_on {
            match scope.resources.get(target.as_str()) {
                Some(index) => {
                    edges.insert(*index);
                }
                None => {
                    return Err(AssemblyError::UnresolvedReference {
                        reference: target.clone(),
                        container,
                    })
                }
            }
        }

        dependencies.push(edges);
    }

    for output in &template.outputs {
        let container = Container::Output(output.name.clone());
        scope.check(&output.value, &container, "Value", &mut BTreeSet::new())?;
    }

    let names = |indices: Vec<usize>| -> Vec<String> {
        indices
            .into_iter()
            .map(|index| template.resources[index].name.clone())
            .collect()
    };

    let order = match realization_order(&dependencies) {
        Ok(order) => names(order),
        Err(cycle) => {
            return Err(AssemblyError::CyclicDependency {
                resources: names(cycle),
            })
        }
    };

    log::debug!(
        "Assembled {} parameters, {} resources, {} outputs",
        template.parameters.len(),
        template.resources.len(),
        template.outputs.len()
    );
    log::trace!("Realization order: {}", order.join(", "));

    Ok(Document {
        format_version: template.format_version.clone(),
        description: template.description.clone(),
        parameters: template.parameters.clone(),
        resources: template.resources.clone(),
        outputs: template.outputs.clone(),
        order,
    })
}

fn invalid_declaration(
    kind: DeclarationKind,
    name: &str,
    error: ValidationErrors,
) -> AssemblyError {
    AssemblyError::InvalidDeclaration {
        kind,
        name: name.to_string(),
        reason: error.to_string(),
    }
}

fn validate_declarations(template: &Template) -> Result<(), AssemblyError> {
    for parameter in &template.parameters {
        parameter.validate().map_err(|error| {
            invalid_declaration(DeclarationKind::Parameter, &parameter.name, error)
        })?;
    }

    for resource in &template.resources {
        resource.validate().map_err(|error| {
            invalid_declaration(DeclarationKind::Resource, &resource.name, error)
        })?;
    }

    for output in &template.outputs {
        output
            .validate()
            .map_err(|error| invalid_declaration(DeclarationKind::Output, &output.name, error))?;
    }

    Ok(())
}

/// Names a `Ref` can resolve to
///
/// Parameters and resources share one namespace, outputs have their own.
struct Scope<'a> {
    parameters: HashSet<&'a str>,
    resources: HashMap<&'a str, usize>,
}

impl<'a> Scope<'a> {
    fn new(template: &'a Template) -> Result<Self, AssemblyError> {
        let duplicate = |kind, name: &str| AssemblyError::DuplicateName {
            kind,
            name: name.to_string(),
        };

        let mut parameters = HashSet::new();
        for parameter in &template.parameters {
            if !parameters.insert(parameter.name.as_str()) {
                return Err(duplicate(DeclarationKind::Parameter, &parameter.name));
            }
        }

        let mut resources = HashMap::new();
        for (index, resource) in template.resources.iter().enumerate() {
            let name = resource.name.as_str();
            if parameters.contains(name) || resources.insert(name, index).is_some() {
                return Err(duplicate(DeclarationKind::Resource, name));
            }
        }

        let mut outputs = HashSet::new();
        for output in &template.outputs {
            if !outputs.insert(output.name.as_str()) {
                return Err(duplicate(DeclarationKind::Output, &output.name));
            }
        }

        Ok(Self {
            parameters,
            resources,
        })
    }

    /// Walk a value, collecting the resources it depends on
    fn check(
        &self,
        value: &Value,
        container: &Container,
        path: &str,
        edges: &mut BTreeSet<usize>,
    ) -> Result<(), AssemblyError> {
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
            Value::List(values) => {
                for (index, value) in values.iter().enumerate() {
                    self.check(value, container, &format!("{path}[{index}]"), edges)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (key, value) in entries {
                    self.check(value, container, &format!("{path}.{key}"), edges)?;
                }
                Ok(())
            }
            Value::Ref(name) => self.resolve(name, container, edges),
            Value::Call(intrinsic) => self.check_call(
                intrinsic,
                container,
                &format!("{path}.{}", intrinsic.name()),
                edges,
            ),
        }
    }

    fn resolve(
        &self,
        name: &str,
        container: &Container,
        edges: &mut BTreeSet<usize>,
    ) -> Result<(), AssemblyError> {
        if let Some(index) = self.resources.get(name) {
            edges.insert(*index);
            return Ok(());
        }

        if self.parameters.contains(name) || is_pseudo_parameter(name) {
            return Ok(());
        }

        Err(AssemblyError::UnresolvedReference {
            reference: name.to_string(),
            container: container.clone(),
        })
    }

    fn check_call(
        &self,
        intrinsic: &Intrinsic,
        container: &Container,
        path: &str,
        edges: &mut BTreeSet<usize>,
    ) -> Result<(), AssemblyError> {
        let invalid = |reason: String| AssemblyError::InvalidPropertyType {
            container: container.clone(),
            path: path.to_string(),
            reason,
        };

        // Arguments are walked before their shape is checked so a missing
        // name is reported as unresolved, whatever it is nested in
        match intrinsic {
            Intrinsic::Join { values, .. } => {
                for (index, value) in values.iter().enumerate() {
                    self.check(value, container, &format!("{path}[{index}]"), edges)?;
                    if !value.is_string_like() {
                        return Err(invalid(format!(
                            "element {index} of Fn::Join is not a string"
                        )));
                    }
                }
            }

            Intrinsic::Select { index, list } => {
                self.check(index, container, &format!("{path}[0]"), edges)?;
                self.check(list, container, &format!("{path}[1]"), edges)?;

                match index.as_ref() {
                    Value::Number(number) if number.is_u64() => (),
                    Value::String(string) if string.parse::<u64>().is_ok() => (),
                    Value::Ref(_) => (),
                    _ => {
                        return Err(invalid(
                            "Fn::Select index has to be a non-negative integer".into(),
                        ))
                    }
                }

                let selectable = matches!(
                    list.as_ref(),
                    Value::List(_)
                        | Value::Ref(_)
                        | Value::Call(Intrinsic::GetAZs(_))
                        | Value::Call(Intrinsic::GetAtt { .. })
                );
                if !selectable {
                    return Err(invalid("Fn::Select needs a list to select from".into()));
                }
            }

            Intrinsic::Base64(value) => {
                self.check(value, container, path, edges)?;
                if !value.is_string_like() {
                    return Err(invalid("Fn::Base64 needs a string to encode".into()));
                }
            }

            Intrinsic::GetAtt {
                resource,
                attribute,
            } => {
                if attribute.is_empty() {
                    return Err(invalid(format!(
                        "Fn::GetAtt on `{resource}` needs an attribute name"
                    )));
                }

                match self.resources.get(resource.as_str()) {
                    Some(index) => {
                        edges.insert(*index);
                    }
                    None if self.parameters.contains(resource.as_str()) => {
                        return Err(invalid(format!(
                            "Fn::GetAtt target `{resource}` is a parameter, not a resource"
                        )))
                    }
                    None => {
                        return Err(AssemblyError::UnresolvedReference {
                            reference: resource.clone(),
                            container: container.clone(),
                        })
                    }
                }
            }

            Intrinsic::GetAZs(region) => {
                self.check(region, container, path, edges)?;
                if !matches!(region.as_ref(), Value::String(_) | Value::Ref(_)) {
                    return Err(invalid("Fn::GetAZs needs a region name".into()));
                }
            }
        }

        Ok(())
    }
}

/// Kahn's algorithm, ties go to the earliest declared resource
///
/// Returns the participants of one cycle when the graph is not a DAG.
fn realization_order(dependencies: &[BTreeSet<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let count = dependencies.len();
    let mut pending: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; count];

    for (resource, edges) in dependencies.iter().enumerate() {
        for &dependency in edges {
            dependents[dependency].push(resource);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|&(_, &waiting)| waiting == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(resource)) = ready.pop() {
        order.push(resource);

        for &dependent in &dependents[resource] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == count {
        return Ok(order);
    }

    Err(find_cycle(dependencies, &pending))
}

/// Follow unrealized dependencies from the first stuck resource until one repeats
fn find_cycle(dependencies: &[BTreeSet<usize>], pending: &[usize]) -> Vec<usize> {
    // Every stuck resource waits on at least one other stuck resource
    let stuck = |index: usize| pending[index] > 0;

    let Some(mut current) = (0..pending.len()).find(|&index| stuck(index)) else {
        return vec![];
    };

    let mut path: Vec<usize> = vec![];
    loop {
        if let Some(position) = path.iter().position(|&index| index == current) {
            return path.split_off(position);
        }
        path.push(current);

        match dependencies[current].iter().copied().find(|&index| stuck(index)) {
            Some(next) => current = next,
            None => return path,
        }
    }
}
