//! Function-call surface offered to a chat assistant.
//!
//! The assistant only sees [`tool_definitions`] and sends back tool calls
//! whose arguments are a JSON string; [`dispatch`] runs them through the
//! [`Catalog`] and answers with a short text plus the typed outcome.

use crate::app::catalog::{Catalog, MutationOutcome};
use crate::app::sources::crypto::{CoinUpdate, NewCoin};
use crate::core::transform::Category;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CREATE_CRYPTO: &str = "create_crypto";
pub const DELETE_CRYPTO_BY_NAME: &str = "delete_crypto_by_name";
pub const UPDATE_CRYPTO: &str = "update_crypto";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON object, as sent by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReply {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Deserialize)]
struct DeleteByName {
    nom: String,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: String,
    #[serde(flatten)]
    fields: CoinUpdate,
}

/// JSON-schema tool definitions in the chat-completions `tools` format.
pub fn tool_definitions() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();

    json!([
        {
            "type": "function",
            "function": {
                "name": CREATE_CRYPTO,
                "description": "Ajouter une nouvelle cryptomonnaie dans la base de données.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "nom": {"type": "string", "description": "Le nom de la crypto (ex: Bitcoin)"},
                        "symbole": {"type": "string", "description": "Le ticker (ex: BTC)"},
                        "prix": {"type": "number", "description": "Le prix actuel en USD"},
                        "categorie": {"type": "string", "enum": categories}
                    },
                    "required": ["nom", "symbole", "prix", "categorie"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": DELETE_CRYPTO_BY_NAME,
                "description": "Supprimer une crypto en donnant son nom.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "nom": {"type": "string", "description": "Le nom exact de la crypto à supprimer"}
                    },
                    "required": ["nom"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": UPDATE_CRYPTO,
                "description": "Modifier le prix ou la catégorie d'une crypto existante.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "description": "Identifiant du document"},
                        "prix": {"type": "number", "description": "Nouveau prix en USD"},
                        "categorie": {"type": "string", "enum": categories}
                    },
                    "required": ["id"]
                }
            }
        }
    ])
}

pub async fn dispatch(catalog: &Catalog<'_>, call: &ToolCall) -> ToolReply {
    tracing::info!("🛠️ Tool call {} ({})", call.name, call.id);

    let outcome = match call.name.as_str() {
        CREATE_CRYPTO => match parse_arguments::<NewCoin>(call) {
            Ok(coin) => catalog.create(coin).await,
            Err(rejected) => rejected,
        },
        DELETE_CRYPTO_BY_NAME => match parse_arguments::<DeleteByName>(call) {
            Ok(args) => catalog.delete_by_natural_key(&args.nom).await,
            Err(rejected) => rejected,
        },
        UPDATE_CRYPTO => match parse_arguments::<UpdateArgs>(call) {
            Ok(args) => catalog.update(&args.id, args.fields).await,
            Err(rejected) => rejected,
        },
        other => MutationOutcome::Rejected {
            field: "name".to_string(),
            reason: format!("unknown tool '{}'", other),
        },
    };

    ToolReply {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        content: reply_text(call, &outcome),
        outcome,
    }
}

fn parse_arguments<T: DeserializeOwned>(call: &ToolCall) -> Result<T, MutationOutcome> {
    serde_json::from_str(&call.arguments).map_err(|e| MutationOutcome::Rejected {
        field: "arguments".to_string(),
        reason: e.to_string(),
    })
}

fn reply_text(call: &ToolCall, outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Created { id } => {
            let nom = serde_json::from_str::<Value>(&call.arguments)
                .ok()
                .and_then(|v| v.get("nom").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            format!("Succès : {} a été ajouté (id {}).", nom, id)
        }
        MutationOutcome::Updated { id } => format!("Crypto {} modifiée.", id),
        MutationOutcome::Deleted { .. } => "Supprimé avec succès.".to_string(),
        MutationOutcome::NotFound => "Crypto non trouvée.".to_string(),
        MutationOutcome::Rejected { field, reason } => {
            format!("Refusé ({}) : {}", field, reason)
        }
        MutationOutcome::Failed { reason } => format!("Échec : {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStore;
    use crate::domain::model::CollectionRef;
    use crate::domain::ports::DocumentStore;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_tool_definitions_shape() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec![CREATE_CRYPTO, DELETE_CRYPTO_BY_NAME, UPDATE_CRYPTO]);
        assert_eq!(
            tools[0]["function"]["parameters"]["properties"]["categorie"]["enum"][0],
            "top-tier"
        );
    }

    #[tokio::test]
    async fn test_create_and_delete_through_tools() {
        let store = MemoryStore::new();
        let target = CollectionRef::new("crypto_data", "market_cap_clean");
        let catalog = Catalog::new(&store, target.clone(), "nom");

        let reply = dispatch(
            &catalog,
            &call(
                CREATE_CRYPTO,
                json!({"nom": "TestCoin", "symbole": "tst", "prix": 50, "categorie": "portfolio"}),
            ),
        )
        .await;
        assert!(matches!(reply.outcome, MutationOutcome::Created { .. }));
        assert!(reply.content.starts_with("Succès : TestCoin"));
        assert_eq!(reply.tool_call_id, "call_1");

        let docs = store.find_all(&target).await.unwrap();
        assert_eq!(docs[0]["prix_usd"], 50.0);

        let reply = dispatch(&catalog, &call(DELETE_CRYPTO_BY_NAME, json!({"nom": "TestCoin"}))).await;
        assert_eq!(reply.content, "Supprimé avec succès.");

        let reply = dispatch(&catalog, &call(DELETE_CRYPTO_BY_NAME, json!({"nom": "TestCoin"}))).await;
        assert_eq!(reply.outcome, MutationOutcome::NotFound);
        assert_eq!(reply.content, "Crypto non trouvée.");
    }

    #[tokio::test]
    async fn test_bad_calls_are_rejected() {
        let store = MemoryStore::new();
        let catalog = Catalog::new(&store, CollectionRef::new("crypto_data", "c"), "nom");

        let reply = dispatch(&catalog, &call("drop_database", json!({}))).await;
        assert!(matches!(reply.outcome, MutationOutcome::Rejected { ref field, .. } if field == "name"));

        let reply = dispatch(&catalog, &call(CREATE_CRYPTO, json!({"nom": "X"}))).await;
        assert!(
            matches!(reply.outcome, MutationOutcome::Rejected { ref field, .. } if field == "arguments")
        );

        let reply = dispatch(
            &catalog,
            &call(
                CREATE_CRYPTO,
                json!({"nom": "X", "symbole": "X", "prix": 1, "categorie": "Top 10"}),
            ),
        )
        .await;
        assert!(
            matches!(reply.outcome, MutationOutcome::Rejected { ref field, .. } if field == "categorie")
        );
    }

    #[tokio::test]
    async fn test_update_through_tool() {
        let store = MemoryStore::new();
        let target = CollectionRef::new("crypto_data", "market_cap_clean");
        let catalog = Catalog::new(&store, target.clone(), "nom");
        let id = match dispatch(
            &catalog,
            &call(
                CREATE_CRYPTO,
                json!({"nom": "A", "symbole": "a", "prix": 1, "categorie": "other"}),
            ),
        )
        .await
        .outcome
        {
            MutationOutcome::Created { id } => id,
            other => panic!("unexpected outcome {:?}", other),
        };

        let reply = dispatch(
            &catalog,
            &call(UPDATE_CRYPTO, json!({"id": id, "prix": 2.5, "categorie": "meme-coin"})),
        )
        .await;
        assert!(matches!(reply.outcome, MutationOutcome::Updated { .. }));

        let docs = store.find_all(&target).await.unwrap();
        assert_eq!(docs[0]["prix_usd"], 2.5);
        assert_eq!(docs[0]["categorie"], "meme-coin");
    }
}
