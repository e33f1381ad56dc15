//! Document resolution: query text plus operation name.

use graphql_parser::query::{Definition, Document, OperationDefinition, parse_query};
use std::sync::Arc;
use tracing::trace;

use crate::{GraphQLError, Result};

/// A parsed executable document.
pub type DocumentNode = Document<'static, String>;

/// A GraphQL document as passed by callers.
#[derive(Debug, Clone)]
pub enum RequestDocument {
    /// Query-language text, sent as is.
    Raw(String),
    /// A parsed document, printed before sending.
    Parsed(Arc<DocumentNode>),
}

impl RequestDocument {
    /// Parse text into a structured document.
    pub fn parse(text: &str) -> Result<Self> {
        let document = parse_query::<String>(text)
            .map_err(|e| GraphQLError::InvalidArgument(format!("invalid document: {}", e)))?;
        Ok(Self::Parsed(Arc::new(document.into_static())))
    }

    /// Resolve into query text and operation name.
    pub fn resolve(&self) -> ResolvedDocument {
        resolve_request_document(self)
    }
}

impl From<&str> for RequestDocument {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

impl From<String> for RequestDocument {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&String> for RequestDocument {
    fn from(text: &String) -> Self {
        Self::Raw(text.clone())
    }
}

impl From<DocumentNode> for RequestDocument {
    fn from(document: DocumentNode) -> Self {
        Self::Parsed(Arc::new(document))
    }
}

impl From<Arc<DocumentNode>> for RequestDocument {
    fn from(document: Arc<DocumentNode>) -> Self {
        Self::Parsed(document)
    }
}

/// Query text ready to send, with the operation name when it is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    /// Query-language text.
    pub query: String,
    /// Name of the only operation in the document, if there is exactly one.
    pub operation_name: Option<String>,
}

/// Resolve a document.
///
/// Raw text is returned verbatim. It is parsed only to find the operation
/// name, and a parse failure just leaves the name unset. Parsed documents are
/// printed back to query-language text.
pub fn resolve_request_document(document: &RequestDocument) -> ResolvedDocument {
    match document {
        RequestDocument::Raw(text) => {
            let operation_name = match parse_query::<String>(text) {
                Ok(parsed) => extract_operation_name(&parsed),
                Err(err) => {
                    trace!(error = %err, "Document did not parse; operation name left unset");
                    None
                }
            };
            ResolvedDocument {
                query: text.clone(),
                operation_name,
            }
        }
        RequestDocument::Parsed(parsed) => ResolvedDocument {
            query: parsed.to_string(),
            operation_name: extract_operation_name(parsed),
        },
    }
}

/// Name of the single operation definition, ignoring fragments.
///
/// Zero or several operations yield `None`, as does one anonymous operation.
pub fn extract_operation_name(document: &Document<'_, String>) -> Option<String> {
    let mut operations = document.definitions.iter().filter_map(|definition| match definition {
        Definition::Operation(operation) => Some(operation),
        Definition::Fragment(_) => None,
    });

    match (operations.next(), operations.next()) {
        (Some(operation), None) => operation_name(operation).cloned(),
        _ => None,
    }
}

fn operation_name<'d>(operation: &'d OperationDefinition<'_, String>) -> Option<&'d String> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_ref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_ref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_ref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_single_named_operation() {
        let resolved = RequestDocument::from("query Me { me { id } }").resolve();
        assert_eq!(resolved.query, "query Me { me { id } }");
        assert_eq!(resolved.operation_name.as_deref(), Some("Me"));
    }

    #[test]
    fn test_fragments_are_ignored() {
        let text = "mutation Save { save { ...F } } fragment F on Result { ok }";
        let resolved = RequestDocument::from(text).resolve();
        assert_eq!(resolved.operation_name.as_deref(), Some("Save"));
    }

    #[test]
    fn test_ambiguous_documents_have_no_name() {
        let two = RequestDocument::from("query A { a } query B { b }").resolve();
        assert!(two.operation_name.is_none());

        let none = RequestDocument::from("fragment F on Query { a }").resolve();
        assert!(none.operation_name.is_none());

        let anonymous = RequestDocument::from("{ me { id } }").resolve();
        assert!(anonymous.operation_name.is_none());
    }

    #[test]
    fn test_unparseable_text_is_kept() {
        let text = "query Broken { me { id }";
        let resolved = RequestDocument::from(text).resolve();
        assert_eq!(resolved.query, text);
        assert!(resolved.operation_name.is_none());
    }

    #[test]
    fn test_parsed_document_is_printed() {
        let document = RequestDocument::parse("subscription OnEvent { event { id } }").unwrap();
        let resolved = document.resolve();
        assert_eq!(resolved.operation_name.as_deref(), Some("OnEvent"));
        assert!(resolved.query.starts_with("subscription OnEvent {"));

        let reparsed = RequestDocument::from(resolved.query.as_str()).resolve();
        assert_eq!(reparsed.operation_name, resolved.operation_name);
    }

    #[test]
    fn test_parse_rejects_invalid_text() {
        assert!(matches!(
            RequestDocument::parse("query {"),
            Err(GraphQLError::InvalidArgument(_))
        ));
    }
}
