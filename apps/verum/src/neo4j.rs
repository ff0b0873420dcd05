//! # Neo4j Store
//!
//! [`TransactionalStore`] over the Neo4j transactional Cypher endpoint
//! (`POST /db/data/transaction/commit`). Every statement of a transaction is
//! sent in one request; Neo4j commits all of them or rolls all of them back.

use crate::config::{DEFAULT_STORE_PORT, StoreSettings};
use serde_json::{Map, Value, json};
use tracing::debug;
use verum_core::importer::{CommitResult, Statement, StoredNode, Transaction};
use verum_core::{Attributes, StoreId, TransactionalStore, VerumError};

/// Blocking client for one Neo4j server.
#[derive(Clone)]
pub struct Neo4jStore {
    http: reqwest::blocking::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for Neo4jStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jStore")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl Neo4jStore {
    /// A client for `http://host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: format!("http://{host}:{port}"),
            credentials: None,
        }
    }

    /// Send HTTP basic auth with every request.
    #[must_use]
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some((user.to_string(), password.to_string()));
        self
    }

    /// A client for the `[store]` settings; host is required.
    pub fn from_settings(store: &StoreSettings) -> Result<Self, VerumError> {
        let host = store.host.as_deref().ok_or_else(|| {
            VerumError::Configuration("[store] host is required for neo4j".to_string())
        })?;
        let client = Self::new(host, store.port.unwrap_or(DEFAULT_STORE_PORT));
        Ok(match (&store.user, &store.password) {
            (Some(user), Some(password)) => client.with_credentials(user, password),
            _ => client,
        })
    }

    #[must_use]
    pub fn commit_url(&self) -> String {
        format!("{}/db/data/transaction/commit", self.base_url)
    }

    fn send(&self, body: &Value) -> Result<Value, VerumError> {
        let mut request = self.http.post(self.commit_url()).json(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        let response = request
            .send()
            .map_err(|e| VerumError::StoreError(format!("cannot reach {}: {e}", self.base_url)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VerumError::StoreError(
                "unauthorized: invalid or missing credentials".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(VerumError::StoreError(format!(
                "server error ({}): {text}",
                status.as_u16()
            )));
        }
        response
            .json::<Value>()
            .map_err(|e| VerumError::StoreError(format!("unreadable response: {e}")))
    }
}

impl TransactionalStore for Neo4jStore {
    fn commit(&mut self, transaction: Transaction) -> Result<CommitResult, VerumError> {
        let body = request_body(&transaction);
        debug!(statements = transaction.len(), url = %self.commit_url(), "sending transaction");
        let response = self.send(&body)?;
        parse_response(&response)
    }
}

// =============================================================================
// CYPHER RENDERING
// =============================================================================

/// Quote a label or relationship type.
fn quote_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn properties(attributes: &Attributes) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>(),
    )
}

/// Cypher text and parameters of one statement.
#[must_use]
pub fn render(statement: &Statement) -> Value {
    match statement {
        Statement::MergeNode {
            label,
            key,
            value,
            properties: props,
        } => json!({
            "statement": format!(
                "MERGE (node:{} {{key: $key, value: $value}}) \
                 ON CREATE SET node = $props \
                 RETURN id(node), properties(node)",
                quote_name(label)
            ),
            "parameters": {
                "key": key,
                "value": value,
                "props": properties(props),
            },
        }),
        Statement::CreateEdge {
            source_label,
            target_label,
            source_id,
            target_id,
            relationship,
            properties: props,
        } => json!({
            "statement": format!(
                "MATCH (src:{}), (dst:{}) \
                 WHERE id(src) = $src_id AND id(dst) = $dst_id \
                 CREATE (src)-[rel:{} $props]->(dst)",
                quote_name(source_label),
                quote_name(target_label),
                quote_name(relationship)
            ),
            "parameters": {
                "src_id": source_id.0,
                "dst_id": target_id.0,
                "props": properties(props),
            },
        }),
    }
}

/// Request body for a whole transaction.
#[must_use]
pub fn request_body(transaction: &Transaction) -> Value {
    let statements: Vec<Value> = transaction
        .statements()
        .iter()
        .map(|statement| {
            let mut rendered = render(statement);
            if let Some(object) = rendered.as_object_mut() {
                object.insert("resultDataContents".to_string(), json!(["row"]));
                object.insert("includeStats".to_string(), Value::Bool(true));
            }
            rendered
        })
        .collect();
    json!({ "statements": statements })
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Turn a commit response into a [`CommitResult`].
///
/// A non-empty `errors` array means Neo4j rolled the transaction back.
pub fn parse_response(response: &Value) -> Result<CommitResult, VerumError> {
    if let Some(errors) = response.get("errors").and_then(Value::as_array)
        && let Some(first) = errors.first()
    {
        let code = first.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let message = first.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(VerumError::StoreError(format!(
            "{code}: {message} ({} error(s))",
            errors.len()
        )));
    }

    let results = response
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| VerumError::StoreError("response has no results".to_string()))?;

    let mut commit = CommitResult::default();
    for result in results {
        commit.relationships_created += result
            .pointer("/stats/relationships_created")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let rows = result
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for row in rows.iter().filter_map(|d| d.get("row").and_then(Value::as_array)) {
            if let [id, props] = row.as_slice() {
                commit.nodes.push(stored_node(id, props)?);
            }
        }
    }
    Ok(commit)
}

fn stored_node(id: &Value, props: &Value) -> Result<StoredNode, VerumError> {
    let id = id
        .as_u64()
        .ok_or_else(|| VerumError::StoreError(format!("node id is not a number: {id}")))?;
    let properties = props
        .as_object()
        .ok_or_else(|| VerumError::StoreError("node properties are not a map".to_string()))?
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect();
    Ok(StoredNode {
        id: StoreId(id),
        properties,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_node() -> Statement {
        Statement::MergeNode {
            label: "attribute".to_string(),
            key: "domain".to_string(),
            value: "example.com".to_string(),
            properties: Attributes::from([("class".to_string(), "attribute".to_string())]),
        }
    }

    #[test]
    fn merge_node_renders_parameters() {
        let rendered = render(&merge_node());
        let text = rendered["statement"].as_str().unwrap_or_default();
        assert!(text.starts_with("MERGE (node:`attribute` {key: $key, value: $value})"));
        assert!(text.contains("ON CREATE SET node = $props"));
        assert_eq!(rendered["parameters"]["value"], "example.com");
        assert_eq!(rendered["parameters"]["props"]["class"], "attribute");
    }

    #[test]
    fn names_are_backtick_quoted() {
        assert_eq!(quote_name("described`By"), "`described``By`");
    }

    #[test]
    fn create_edge_renders_ids() {
        let rendered = render(&Statement::CreateEdge {
            source_label: "attribute".to_string(),
            target_label: "attribute".to_string(),
            source_id: StoreId(3),
            target_id: StoreId(9),
            relationship: "describedBy".to_string(),
            properties: Attributes::new(),
        });
        let text = rendered["statement"].as_str().unwrap_or_default();
        assert!(text.contains("CREATE (src)-[rel:`describedBy` $props]->(dst)"));
        assert_eq!(rendered["parameters"]["src_id"], 3);
        assert_eq!(rendered["parameters"]["dst_id"], 9);
    }

    #[test]
    fn request_body_asks_for_rows_and_stats() {
        let mut transaction = Transaction::new();
        transaction.push(merge_node());
        let body = request_body(&transaction);
        assert_eq!(body["statements"][0]["resultDataContents"][0], "row");
        assert_eq!(body["statements"][0]["includeStats"], true);
    }

    #[test]
    fn commit_url_uses_transaction_endpoint() {
        let store = Neo4jStore::new("localhost", 7474);
        assert_eq!(
            store.commit_url(),
            "http://localhost:7474/db/data/transaction/commit"
        );
    }
}
