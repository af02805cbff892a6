use super::{DiagnosticCategory, DiagnosticMessage};

pub mod diagnostic_codes {
    pub const NO_BINDING_FOUND: u32 = 1001;
    pub const MULTIPLE_BINDINGS_FOUND: u32 = 1002;
    pub const CIRCULAR_DEPENDENCY: u32 = 1003;
    pub const DUPLICATE_COLLECTION_ENTRY: u32 = 1004;
    pub const OVERRIDE_NOT_ALLOWED: u32 = 1005;
    pub const RESOLUTION_TOO_DEEP: u32 = 1006;
    pub const UNKNOWN_CLASSIFIER: u32 = 1007;
    pub const MODULE_INCLUDES_ITSELF: u32 = 1008;
    pub const RESOLUTION_STEP_BUDGET_EXCEEDED: u32 = 1009;
    pub const REQUIRED_BY: u32 = 1101;
    pub const CANDIDATE_DECLARED_AT: u32 = 1102;
    pub const CYCLE_MEMBER: u32 = 1103;
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: diagnostic_codes::NO_BINDING_FOUND,
        category: DiagnosticCategory::Error,
        message: "No binding found for '{0}' in '{1}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::MULTIPLE_BINDINGS_FOUND,
        category: DiagnosticCategory::Error,
        message: "Multiple {0} bindings found for '{1}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::CIRCULAR_DEPENDENCY,
        category: DiagnosticCategory::Error,
        message: "Circular dependency: {0}.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::DUPLICATE_COLLECTION_ENTRY,
        category: DiagnosticCategory::Error,
        message: "Already declared {0} in '{1}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::OVERRIDE_NOT_ALLOWED,
        category: DiagnosticCategory::Error,
        message: "Binding for '{0}' in '{1}' would override an existing binding without override intent.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::RESOLUTION_TOO_DEEP,
        category: DiagnosticCategory::Error,
        message: "Resolution of '{0}' is excessively deep and possibly infinite.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::UNKNOWN_CLASSIFIER,
        category: DiagnosticCategory::Error,
        message: "Unknown classifier '{0}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::MODULE_INCLUDES_ITSELF,
        category: DiagnosticCategory::Error,
        message: "Module '{0}' includes itself.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::RESOLUTION_STEP_BUDGET_EXCEEDED,
        category: DiagnosticCategory::Error,
        message: "Resolution of '{0}' made more than {1} requests.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::REQUIRED_BY,
        category: DiagnosticCategory::Message,
        message: "'{0}' is required by '{1}'",
    },
    DiagnosticMessage {
        code: diagnostic_codes::CANDIDATE_DECLARED_AT,
        category: DiagnosticCategory::Message,
        message: "candidate declared at '{0}'",
    },
    DiagnosticMessage {
        code: diagnostic_codes::CYCLE_MEMBER,
        category: DiagnosticCategory::Message,
        message: "'{0}' is part of the cycle",
    },
];
