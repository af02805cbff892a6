//! Human-readable rendering of types for diagnostics and traces.

use crate::classifiers::ClassifierStore;
use crate::types::{ClassifierId, TypeRef};
use std::fmt::Write;

/// Renders [`TypeRef`]s.
///
/// With a store, classifiers and qualifiers print by name. Without one
/// (`TypeFormatter::plain`) they print as `#id`, which is what the `Display`
/// impls of error types fall back to.
#[derive(Clone, Copy)]
pub struct TypeFormatter<'a> {
    classifiers: Option<&'a ClassifierStore>,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(classifiers: &'a ClassifierStore) -> Self {
        Self {
            classifiers: Some(classifiers),
        }
    }

    pub fn plain() -> Self {
        Self { classifiers: None }
    }

    pub fn format(&self, ty: &TypeRef) -> String {
        let mut out = String::new();
        self.write(&mut out, ty);
        out
    }

    fn write(&self, out: &mut String, ty: &TypeRef) {
        if ty.star {
            out.push('*');
            return;
        }
        for qualifier in ty.qualifiers.iter() {
            match self.classifiers.and_then(|s| s.qualifier_name(qualifier)) {
                Some(name) => {
                    let _ = write!(out, "@{} ", name.short_name());
                }
                None => {
                    let _ = write!(out, "@#{} ", qualifier.0);
                }
            }
        }
        if let Some((parameters, returns)) = ty.function_parts() {
            match ty.classifier {
                ClassifierId::SUSPEND_FUNCTION => out.push_str("suspend "),
                ClassifierId::COMPOSABLE_FUNCTION => out.push_str("@Composable "),
                _ => {}
            }
            if ty.nullable {
                out.push('(');
            }
            out.push('(');
            self.write_list(out, parameters);
            out.push_str(") -> ");
            self.write(out, returns);
            if ty.nullable {
                out.push_str(")?");
            }
            return;
        }
        self.write_classifier(out, ty.classifier);
        if !ty.arguments.is_empty() {
            out.push('<');
            self.write_list(out, &ty.arguments);
            out.push('>');
        }
        if ty.nullable {
            out.push('?');
        }
    }

    fn write_list(&self, out: &mut String, types: &[TypeRef]) {
        for (i, ty) in types.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write(out, ty);
        }
    }

    fn write_classifier(&self, out: &mut String, id: ClassifierId) {
        match self.classifiers.and_then(|s| s.name(id)) {
            Some(name) => out.push_str(name.as_str()),
            None => {
                let _ = write!(out, "#{}", id.0);
            }
        }
    }
}
