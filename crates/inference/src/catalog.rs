use crate::error::CatalogError;
use std::collections::HashSet;
use std::fmt;

/// Components every good bottle must show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Cap,
    Fill,
    Label,
}

impl Component {
    /// Fixed check order used when reporting missing components.
    pub const ALL: [Component; 3] = [Component::Cap, Component::Fill, Component::Label];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Cap => "cap",
            Component::Fill => "fill",
            Component::Label => "label",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_CLASSES: [&str; 7] = [
    "Cap-Defect",
    "Fill-Defect",
    "Label-Defect",
    "Bottle-Defect",
    "cap",
    "fill",
    "label",
];

pub const DEFAULT_DEFECT_CLASSES: usize = 4;

/// Ordered class names matching the model's score vector.
///
/// The first `defect_classes` entries are defects; the components are looked
/// up by name among the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
    defect_classes: usize,
    components: [usize; 3],
}

impl ClassCatalog {
    pub fn new(names: Vec<String>, defect_classes: usize) -> Result<Self, CatalogError> {
        if names.is_empty() {
            return Err(CatalogError::Empty);
        }
        if defect_classes > names.len() {
            return Err(CatalogError::TooManyDefects {
                defect_classes,
                len: names.len(),
            });
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(CatalogError::Duplicate(name.clone()));
            }
        }

        let mut components = [0usize; 3];
        for (slot, component) in components.iter_mut().zip(Component::ALL) {
            let index = names
                .iter()
                .position(|n| n == component.as_str())
                .ok_or(CatalogError::MissingComponent(component.as_str()))?;
            if index < defect_classes {
                return Err(CatalogError::ComponentIsDefect(component.as_str()));
            }
            *slot = index;
        }

        Ok(Self {
            names,
            defect_classes,
            components,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn is_defect(&self, class_id: usize) -> bool {
        class_id < self.defect_classes
    }

    pub fn component(&self, class_id: usize) -> Option<Component> {
        Component::ALL
            .into_iter()
            .zip(self.components)
            .find(|(_, idx)| *idx == class_id)
            .map(|(c, _)| c)
    }

    pub fn class_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Row width the model must emit: four box values plus one score per class.
    pub fn expected_row_width(&self) -> usize {
        4 + self.names.len()
    }

    pub fn check_row_width(&self, actual: usize) -> Result<(), CatalogError> {
        let expected = self.expected_row_width();
        if actual != expected {
            return Err(CatalogError::WidthMismatch { expected, actual });
        }
        Ok(())
    }
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self {
            names: DEFAULT_CLASSES.iter().map(|s| s.to_string()).collect(),
            defect_classes: DEFAULT_DEFECT_CLASSES,
            components: [4, 5, 6],
        }
    }
}
