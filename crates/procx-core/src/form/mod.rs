//! Form models pre-filled from prior submissions and variables

mod model;
mod resolver;
mod service;

pub use model::{
    FormDefinition, FormField, FormInstance, FormModel, FormOutcome, FIELD_TYPE_CONTAINER, FIELD_TYPE_DATE,
    FIELD_TYPE_EXPRESSION,
};
pub use resolver::{
    ExpressionEvaluator, FormDefinitionResolver, FormInstanceQuery, InMemoryFormRepository, VariableExpressionEvaluator,
    NO_TENANT_ID,
};
pub use service::{get_form_model_with_variables, resolve_form_definition, FormModelRequest};
