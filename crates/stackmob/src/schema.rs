//! Per-schema object operations.

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::Client;
use crate::dispatcher::Call;
use crate::error::InvalidInputError;
use crate::operation::Operation;
use crate::query::{EXPAND_PARAM, MAX_EXPAND_DEPTH, Query};
use crate::request::ApiResponse;

/// Operations on the objects of one schema.
///
/// Objects are plain JSON; their primary key lives in `<schema>_id`, or in
/// the login field for the user schema.
///
/// ```no_run
/// # use stackmob::Client;
/// # async fn example(client: Client) -> Result<(), stackmob::Error> {
/// let todos = client.schema("todo");
/// let created = todos.create(serde_json::json!({"name": "write docs"})).await?;
/// let id = created["todo_id"].as_str().unwrap_or_default().to_string();
/// todos.increment(&id, "views", 1).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Schema<'a> {
    client: &'a Client,
    name: String,
    primary_key: String,
    is_user_schema: bool,
    binary_fields: Vec<String>,
    ignore_fields: Vec<String>,
}

impl<'a> Schema<'a> {
    pub(crate) fn new(client: &'a Client, name: impl Into<String>) -> Self {
        let name = name.into();
        let user_schema = client.config().user_schema();
        let is_user_schema = name == user_schema.schema_name;
        let primary_key = if is_user_schema {
            user_schema.login_field.clone()
        } else {
            format!("{name}_id")
        };
        Self {
            client,
            name,
            primary_key,
            is_user_schema,
            binary_fields: Vec::new(),
            ignore_fields: Vec::new(),
        }
    }

    pub(crate) fn users(client: &'a Client) -> Self {
        Self::new(client, client.config().user_schema().schema_name.clone())
    }

    /// Declare binary fields; on update, values that are already URLs are
    /// not sent back.
    pub fn with_binary_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Fields never sent on create or update.
    pub fn with_ignored_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field holding an object's primary key.
    pub fn primary_key_field(&self) -> &str {
        &self.primary_key
    }

    fn call(&self, operation: Operation) -> Call {
        let mut call = Call::new(operation)
            .schema(self.name.clone())
            .binary_fields(self.binary_fields.clone())
            .ignore_fields(self.ignore_fields.clone());
        if self.is_user_schema {
            call = call.schema_info(self.client.config().user_schema().clone());
        }
        call
    }

    async fn send(&self, call: Call) -> Result<ApiResponse> {
        self.client.dispatch(call).await
    }

    /// Create an object. Always a POST, even when the object carries its
    /// primary key. On the user schema this is a user creation.
    #[instrument(skip(self, object), fields(schema = %self.name))]
    pub async fn create(&self, object: Value) -> Result<Value> {
        let mut call = self.call(Operation::Create).body(object).force_create();
        if self.is_user_schema {
            call = call.user_create();
        }
        Ok(self.send(call).await?.into_value())
    }

    /// Create several objects in one request.
    #[instrument(skip(self, objects), fields(schema = %self.name, count = objects.len()))]
    pub async fn create_all(&self, objects: Vec<Value>) -> Result<Value> {
        let call = self.call(Operation::Create).body(Value::Array(objects));
        Ok(self.send(call).await?.into_value())
    }

    #[instrument(skip(self), fields(schema = %self.name))]
    pub async fn fetch(&self, id: &str) -> Result<Value> {
        let call = self.call(Operation::Read).id(id);
        Ok(self.send(call).await?.into_value())
    }

    /// Fetch an object with related objects expanded `depth` levels deep.
    ///
    /// # Errors
    ///
    /// Returns an error before sending if `depth` is greater than 3.
    #[instrument(skip(self), fields(schema = %self.name))]
    pub async fn fetch_expanded(&self, id: &str, depth: u8) -> Result<Value> {
        if depth > MAX_EXPAND_DEPTH {
            return Err(InvalidInputError::ExpandDepth { depth }.into());
        }
        let call = self.call(Operation::Read).id(id).param(EXPAND_PARAM, depth);
        Ok(self.send(call).await?.into_value())
    }

    /// Update the given fields of an object.
    #[instrument(skip(self, changes), fields(schema = %self.name))]
    pub async fn update(&self, id: &str, changes: Value) -> Result<Value> {
        let call = self.call(Operation::Update).id(id).body(changes);
        Ok(self.send(call).await?.into_value())
    }

    /// Atomically add `amount` to a numeric field.
    #[instrument(skip(self), fields(schema = %self.name))]
    pub async fn increment(&self, id: &str, field: &str, amount: i64) -> Result<Value> {
        let mut body = serde_json::Map::new();
        body.insert(format!("{field}[inc]"), json!(amount));
        self.update(id, Value::Object(body)).await
    }

    #[instrument(skip(self), fields(schema = %self.name))]
    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.send(self.call(Operation::Delete).id(id)).await?;
        Ok(())
    }

    /// Delete every object matching `query`.
    #[instrument(skip(self, query), fields(schema = %self.name))]
    pub async fn destroy_all(&self, query: &Query) -> Result<()> {
        self.send(self.call(Operation::Delete).query(query.clone()))
            .await?;
        Ok(())
    }

    /// Objects matching `query`.
    #[instrument(skip(self, query), fields(schema = %self.name))]
    pub async fn query(&self, query: &Query) -> Result<Vec<Value>> {
        let response = self
            .send(self.call(Operation::Query).query(query.clone()))
            .await?;
        Ok(match response.into_value() {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<Value>> {
        self.query(&Query::new()).await
    }

    /// Number of objects matching `query`.
    ///
    /// Asks for a single object and reads the total from `Content-Range`,
    /// falling back to the length of the returned array.
    #[instrument(skip(self, query), fields(schema = %self.name))]
    pub async fn count(&self, query: &Query) -> Result<u64> {
        let query = query.clone().set_range(0, 0);
        let response = self
            .send(self.call(Operation::Query).query(query))
            .await?;

        let total = response
            .header("content-range")
            .and_then(|range| range.rsplit_once('/'))
            .and_then(|(_, total)| total.trim().parse::<u64>().ok())
            .unwrap_or(0);
        if total > 0 {
            return Ok(total);
        }

        let fallback = response
            .body
            .as_ref()
            .and_then(Value::as_array)
            .map_or(0, |items| items.len() as u64);
        debug!(fallback, "No usable Content-Range, counting body");
        Ok(fallback)
    }

    /// Relate new objects to an existing one, creating them.
    #[instrument(skip(self, objects), fields(schema = %self.name))]
    pub async fn add_relationship(&self, id: &str, field: &str, objects: Vec<Value>) -> Result<Value> {
        let call = self
            .call(Operation::AddRelationship)
            .id(id)
            .relation(field, objects);
        Ok(self.send(call).await?.into_value())
    }

    /// Append existing values or ids to an array or relationship field.
    #[instrument(skip(self, values), fields(schema = %self.name))]
    pub async fn append_and_save(&self, id: &str, field: &str, values: Vec<Value>) -> Result<Value> {
        let call = self
            .call(Operation::AppendAndSave)
            .id(id)
            .relation(field, values);
        Ok(self.send(call).await?.into_value())
    }

    /// Remove values from an array or relationship field. With `cascade`,
    /// the related objects are deleted too.
    #[instrument(skip(self, values), fields(schema = %self.name))]
    pub async fn delete_and_save(
        &self,
        id: &str,
        field: &str,
        values: Vec<Value>,
        cascade: bool,
    ) -> Result<()> {
        let call = self
            .call(Operation::DeleteAndSave)
            .id(id)
            .relation(field, values)
            .cascade_delete(cascade);
        self.send(call).await?;
        Ok(())
    }
}
