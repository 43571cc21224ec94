//! Request assembly and the send loop.
//!
//! A [`Call`] names an operation and everything it needs. The
//! [`Dispatcher`] turns it into a [`RequestDescriptor`] (URL, headers,
//! body), refreshes an expired session first when allowed, signs and
//! sends the request, and backs off on 503.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::Result;
use crate::auth::{Credentials, SchemaInfo, SessionManager, TokenResponse};
use crate::config::Config;
use crate::error::{AuthError, Error, InvalidInputError, ProtocolError};
use crate::operation::Operation;
use crate::query::{Query, render_value};
use crate::request::{ApiResponse, RequestDescriptor};
use crate::signer;
use crate::transport::Transport;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

const USER_AGENT_HEADER: &str = "x-stackmob-user-agent";
const USER_AGENT: &str = concat!("StackMob (Rust; ", env!("CARGO_PKG_VERSION"), ")");
const API_KEY_HEADER: &str = "x-stackmob-api-key";
const PROXY_HEADER: &str = "x-stackmob-proxy";
const PROXY_PLAIN_HEADER: &str = "x-stackmob-proxy-plain";
const PROXY_VALUE: &str = "stackmob-api";
const CASCADE_DELETE_HEADER: &str = "x-stackmob-cascadedelete";
const SELECT_HEADER: &str = "x-stackmob-select";
const ORDER_BY_HEADER: &str = "x-stackmob-orderby";
const RANGE_HEADER: &str = "range";

/// Fields the service maintains itself and never accepts on write.
const SERVER_FIELDS: [&str; 2] = ["lastmoddate", "createddate"];
const OWNER_FIELD: &str = "sm_owner";

/// A relationship field and the values (or ids) it is called with.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub field: String,
    pub values: Vec<Value>,
}

/// One logical call.
///
/// ```
/// use stackmob::{Call, Operation, Query};
///
/// let call = Call::new(Operation::Query)
///     .schema("todo")
///     .query(Query::new().lt("age", 25).set_range(0, 9));
/// assert_eq!(call.operation(), &Operation::Query);
/// ```
#[derive(Debug, Clone)]
pub struct Call {
    operation: Operation,
    schema: Option<String>,
    id: Option<String>,
    relation: Option<Relation>,
    body: Option<Value>,
    params: BTreeMap<String, Value>,
    query: Option<Query>,
    verb: Option<Method>,
    force_create: bool,
    secure: bool,
    user_create: bool,
    cascade_delete: Option<bool>,
    ignore_fields: Vec<String>,
    binary_fields: Vec<String>,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    schema_info: Option<SchemaInfo>,
}

impl Call {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            schema: None,
            id: None,
            relation: None,
            body: None,
            params: BTreeMap::new(),
            query: None,
            verb: None,
            force_create: false,
            secure: false,
            user_create: false,
            cascade_delete: None,
            ignore_fields: Vec::new(),
            binary_fields: Vec::new(),
            headers: Vec::new(),
            content_type: None,
            schema_info: None,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema = Some(name.into());
        self
    }

    /// Primary key of the addressed object.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn relation(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.relation = Some(Relation {
            field: field.into(),
            values,
        });
        self
    }

    /// Object sent as the JSON body of a write.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Send with this verb instead of the operation's default.
    pub fn verb(mut self, verb: Method) -> Self {
        self.verb = Some(verb);
        self
    }

    /// POST a create even when an id is set.
    pub fn force_create(mut self) -> Self {
        self.force_create = true;
        self
    }

    /// Use HTTPS regardless of the security mode.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Mark the call as creating a user: HTTPS, no Authorization header.
    pub fn user_create(mut self) -> Self {
        self.user_create = true;
        self
    }

    pub fn cascade_delete(mut self, cascade: bool) -> Self {
        self.cascade_delete = Some(cascade);
        self
    }

    /// Drop these fields from the body before sending.
    pub fn ignore_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Binary fields; on update, values that are already URLs are dropped.
    pub fn binary_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Extra header. May replace `Accept`; the SDK headers always win.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// User schema making the call; decides which password field an
    /// update strips and where token exchanges are stored from.
    pub fn schema_info(mut self, info: SchemaInfo) -> Self {
        self.schema_info = Some(info);
        self
    }
}

/// Turns calls into signed requests and drives them to completion.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    session: SessionManager,
    transport: Arc<dyn Transport>,
    /// Held for the whole refresh exchange; clones share it.
    refresh_lock: Arc<Mutex<()>>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, session: SessionManager, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            session,
            transport,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Build the request for `call` without sending anything.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidInputError`] when the call lacks a schema or id
    /// it needs, or carries an unusable header.
    pub fn prepare(&self, call: &Call) -> Result<RequestDescriptor> {
        let operation = if call.force_create {
            Operation::Create
        } else {
            call.operation.clone()
        };
        let verb = call.verb.clone().unwrap_or_else(|| operation.verb());

        let mut url = self.build_url(call, &operation)?;
        let (body, content_type) = self.build_body(call, &operation, &verb, &mut url)?;
        let url = Url::parse(&url).map_err(|e| InvalidInputError::Url {
            value: url.clone(),
            reason: e.to_string(),
        })?;

        let mut request = RequestDescriptor::new(operation, verb, url);
        request.sign = self.config.is_oauth_mode()
            && !request.operation.is_access_token()
            && !call.user_create;
        request.headers = self.build_headers(call, content_type.as_deref())?;
        request.body = body;
        Ok(request)
    }

    fn build_url(&self, call: &Call, operation: &Operation) -> Result<String> {
        let scheme = self
            .config
            .scheme_for(operation, call.secure, call.user_create);
        let mut url = self.config.base_url(scheme);

        match &call.schema {
            Some(schema) => url.push_str(schema),
            None if operation.is_extra_verb() => {}
            None => {
                return Err(InvalidInputError::MissingSchema {
                    operation: operation.to_string(),
                }
                .into());
            }
        }

        if operation.is_extra_verb() {
            push_segment(&mut url, operation.as_str());
        } else if operation.is_relationship() {
            let id = call.id.as_deref().ok_or_else(|| InvalidInputError::MissingId {
                operation: operation.to_string(),
            })?;
            let relation = call.relation.as_ref().ok_or_else(|| InvalidInputError::Other {
                message: format!("'{operation}' needs a relationship field"),
            })?;

            push_segment(&mut url, &urlencoding::encode(id));
            push_segment(&mut url, &relation.field);

            if *operation == Operation::DeleteAndSave {
                let ids = relation
                    .values
                    .iter()
                    .map(|v| urlencoding::encode(&render_value(v)).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                push_segment(&mut url, &ids);
            }
        } else if *operation != Operation::Create {
            if let Some(id) = &call.id {
                push_segment(&mut url, &urlencoding::encode(id));
            }
        }

        Ok(url)
    }

    fn build_headers(&self, call: &Call, content_type: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        insert_header(
            &mut headers,
            ACCEPT.as_str(),
            &format!("application/vnd.stackmob+json; version={}", self.config.api_version()),
        )?;
        for (name, value) in &call.headers {
            insert_header(&mut headers, name, value)?;
        }

        insert_header(&mut headers, USER_AGENT_HEADER, USER_AGENT)?;
        match self.config.public_key() {
            Some(key) => {
                insert_header(&mut headers, API_KEY_HEADER, key)?;
                insert_header(&mut headers, PROXY_PLAIN_HEADER, PROXY_VALUE)?;
                // CORS marker; some clients strip headers with empty values.
                insert_header(&mut headers, &format!("{API_KEY_HEADER}-{key}"), "1")?;
            }
            None => insert_header(&mut headers, PROXY_HEADER, PROXY_VALUE)?,
        }

        if let Some(content_type) = content_type {
            insert_header(&mut headers, CONTENT_TYPE.as_str(), content_type)?;
        }
        if let Some(cascade) = call.cascade_delete {
            insert_header(&mut headers, CASCADE_DELETE_HEADER, if cascade { "true" } else { "false" })?;
        }

        if let Some(query) = &call.query {
            if let Some(select) = query.select_header() {
                insert_header(&mut headers, SELECT_HEADER, &select)?;
            }
            if let Some(range) = query.range_header() {
                insert_header(&mut headers, RANGE_HEADER, &range)?;
            }
            if let Some(order) = query.order_by_header() {
                insert_header(&mut headers, ORDER_BY_HEADER, &order)?;
            }
        }

        Ok(headers)
    }

    /// Body and content type for the request. GET and DELETE carry their
    /// parameters in the query string instead.
    fn build_body(
        &self,
        call: &Call,
        operation: &Operation,
        verb: &Method,
        url: &mut String,
    ) -> Result<(Option<String>, Option<String>)> {
        let mut data = BTreeMap::new();
        if let Some(query) = &call.query {
            data.extend(query.params().clone());
        }
        data.extend(call.params.clone());

        if self.config.is_oauth_mode() && operation.is_access_token() {
            return Ok((Some(form_encode(&data)), Some(CONTENT_TYPE_FORM.to_string())));
        }

        if *verb == Method::POST || *verb == Method::PUT {
            let json = match operation {
                Operation::ResetPassword | Operation::ForgotPassword => to_object(data),
                Operation::AddRelationship | Operation::AppendAndSave => match &call.relation {
                    Some(relation) => Value::Array(relation.values.clone()),
                    None => to_object(data),
                },
                _ => match &call.body {
                    Some(Value::Object(object)) => {
                        Value::Object(self.writable_fields(call, operation, object.clone(), data))
                    }
                    Some(other) => other.clone(),
                    None => to_object(data),
                },
            };
            let body = serde_json::to_string(&json).map_err(|e| InvalidInputError::Other {
                message: format!("body is not serializable: {e}"),
            })?;
            let content_type = call
                .content_type
                .clone()
                .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string());
            return Ok((Some(body), Some(content_type)));
        }

        if !data.is_empty() {
            url.push('?');
            url.push_str(&form_encode(&data));
        }
        Ok((None, None))
    }

    /// Strip fields the service must not receive, then merge in params.
    fn writable_fields(
        &self,
        call: &Call,
        operation: &Operation,
        mut object: Map<String, Value>,
        params: BTreeMap<String, Value>,
    ) -> Map<String, Value> {
        for field in call.ignore_fields.iter().map(String::as_str).chain(SERVER_FIELDS) {
            object.remove(field);
        }

        if *operation == Operation::Update {
            let schema_info = call.schema_info.clone().or_else(|| self.session.schema_info());
            if let Some(info) = schema_info {
                object.remove(&info.password_field);
            }
            for field in &call.binary_fields {
                let is_url = matches!(object.get(field), Some(Value::String(s)) if s.starts_with("http"));
                if is_url {
                    object.remove(field);
                }
            }
        }

        if self.config.is_oauth_mode() {
            object.remove(OWNER_FIELD);
        }

        object.extend(params);
        object
    }

    /// Send a call, refreshing an expired session first when allowed.
    ///
    /// A refresh is attempted at most once per call. Whether it succeeds or
    /// fails, the original request is then sent exactly once more through
    /// the normal path. Concurrent calls on an expired session wait for a
    /// single refresh and then reuse its result.
    #[instrument(skip(self, call), fields(operation = %call.operation))]
    pub async fn dispatch(&self, call: Call) -> Result<ApiResponse> {
        let mut request = self.prepare(&call)?;

        if !request.operation.is_access_token()
            && !request.attempted_refresh
            && self.session.should_send_refresh_token()
        {
            request.attempted_refresh = true;
            let _guard = self.refresh_lock.lock().await;
            // Another call may have refreshed while this one waited.
            if self.session.should_send_refresh_token() {
                match self.refresh_locked().await {
                    Ok(_) => debug!("Session refreshed, resubmitting"),
                    Err(e) => warn!(error = %e, "Refresh failed, resubmitting with stale credentials"),
                }
            } else {
                debug!("Session refreshed by a concurrent call");
            }
        }

        self.execute(request).await
    }

    /// Exchange tokens and store the resulting credentials.
    ///
    /// Returns the stored credentials and the user object the service sent
    /// back (`null` when absent).
    #[instrument(skip(self, call), fields(operation = %call.operation))]
    pub async fn exchange_token(&self, call: Call) -> Result<(Credentials, Value)> {
        if !self.config.is_oauth_mode() {
            return Err(AuthError::PublicKeyRequired.into());
        }
        let schema_info = call
            .schema_info
            .clone()
            .or_else(|| self.session.schema_info())
            .unwrap_or_else(|| self.config.user_schema().clone());

        let request = self.prepare(&call)?;
        let response = self.execute(request).await?;

        let body = response.body.ok_or_else(|| AuthError::InvalidTokenResponse {
            reason: "empty body".to_string(),
        })?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| AuthError::InvalidTokenResponse {
                reason: e.to_string(),
            })?;

        let credentials = self.session.save_response(&token, schema_info)?;
        let user = token
            .user()
            .cloned()
            .map(Value::Object)
            .unwrap_or(Value::Null);
        info!(user = %credentials.user, "Stored new credentials");
        Ok((credentials, user))
    }

    /// Trade the stored refresh token for fresh credentials.
    ///
    /// On failure the refresh token is discarded, so the session becomes
    /// terminal. Only one refresh runs at a time per client.
    ///
    /// # Errors
    ///
    /// Fails immediately with [`AuthError::NoRefreshToken`] when nothing is
    /// stored.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Credentials> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh body; the caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Credentials> {
        if !self.config.is_oauth_mode() {
            return Err(AuthError::PublicKeyRequired.into());
        }
        let used = self.session.refresh_token();
        let params = self.session.refresh_params()?;
        let schema_info = self
            .session
            .schema_info()
            .unwrap_or_else(|| self.config.user_schema().clone());

        let call = Call::new(Operation::RefreshToken)
            .schema(schema_info.schema_name.clone())
            .params(params)
            .schema_info(schema_info);

        match self.exchange_token(call).await {
            Ok((credentials, _)) => Ok(credentials),
            Err(e) => {
                // Keep a token some other writer stored meanwhile.
                if self.session.refresh_token() == used {
                    self.session.discard_refresh_token()?;
                }
                Err(e)
            }
        }
    }

    /// Sign, send and retry on 503 until a final answer arrives.
    async fn execute(&self, mut request: RequestDescriptor) -> Result<ApiResponse> {
        let policy = self.config.retry();

        loop {
            self.authorize(&mut request)?;
            let response = self.transport.send(&request).await?;

            if response.status == StatusCode::SERVICE_UNAVAILABLE {
                match policy.next_delay(&mut request, &response.headers) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        warn!(operation = %request.operation, "Giving up after repeated 503s");
                        return Err(Error::RetriesExhausted {
                            attempts: policy.attempts,
                        });
                    }
                }
            }

            if !response.is_success() {
                let error = ProtocolError::from_body(response.status.as_u16(), &response.body);
                debug!(%error, "Request failed");
                return Err(error.into());
            }

            return Ok(ApiResponse::from(response));
        }
    }

    /// Attach a fresh MAC header when the request is signed and
    /// credentials are stored.
    fn authorize(&self, request: &mut RequestDescriptor) -> Result<()> {
        request.headers.remove(AUTHORIZATION);
        if !request.sign {
            return Ok(());
        }
        if let Some(credentials) = self.session.credentials() {
            signer::sign_request(request, &credentials.access_token, &credentials.mac_key)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn push_segment(url: &mut String, segment: &str) {
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(segment);
}

/// Percent-encoded `key=value` pairs joined by `&`.
///
/// Brackets in keys stay literal so operator and group names such as
/// `[or1].age[lt]` reach the service unchanged.
pub fn form_encode(data: &BTreeMap<String, Value>) -> String {
    data.iter()
        .map(|(key, value)| {
            format!("{}={}", encode_key(key), urlencoding::encode(&render_value(value)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_key(key: &str) -> String {
    urlencoding::encode(key)
        .replace("%5B", "[")
        .replace("%5D", "]")
}

fn to_object(data: BTreeMap<String, Value>) -> Value {
    Value::Object(data.into_iter().collect())
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let invalid = || InvalidInputError::Header {
        name: name.to_string(),
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    headers.insert(header_name, header_value);
    Ok(())
}
