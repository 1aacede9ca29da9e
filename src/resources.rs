//! Thin wrappers over the backend's resource endpoints.
//!
//! Payload shapes belong to the callers; every wrapper is generic over the response type and
//! accepts any serializable body. Only paths and query encoding live here.

// crates.io
use url::form_urlencoded::Serializer;
// self
use crate::{_prelude::*, client::ApiClient, envelope::Envelope, http::ApiHttpClient};

/// Business account search.
pub const BIZ_SEARCH_ENDPOINT: &str = "/v1/biz/search";
/// Business account create.
pub const BIZ_SAVE_ENDPOINT: &str = "/v1/biz/save";
/// Business account item prefix (`/v1/biz/{id}`).
pub const BIZ_ITEM_PREFIX: &str = "/v1/biz";
/// Operators of a business account.
pub const BIZ_OPERATORS_ENDPOINT: &str = "/v1/user/operators";
/// Provider listing.
pub const PROVIDER_LIST_ENDPOINT: &str = "/v1/provider/list";
/// Provider detail.
pub const PROVIDER_FIND_ENDPOINT: &str = "/v1/provider/find";
/// Provider create/update.
pub const PROVIDER_SAVE_ENDPOINT: &str = "/v1/provider/save";
/// Provider status toggle.
pub const PROVIDER_STATUS_ENDPOINT: &str = "/v1/provider/update_status";
/// Provider removal.
pub const PROVIDER_DELETE_ENDPOINT: &str = "/v1/provider/delete";
/// Template search.
pub const TEMPLATE_SEARCH_ENDPOINT: &str = "/v1/template/search";
/// Per-business configuration lookup.
pub const BIZ_CONFIG_FIND_ENDPOINT: &str = "/v1/biz_config/find";
/// Per-business configuration create/update.
pub const BIZ_CONFIG_SAVE_ENDPOINT: &str = "/v1/biz_config/save";

/// Offset/limit pagination window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageQuery {
	/// Records to skip.
	pub offset: u64,
	/// Maximum records to return.
	pub limit: u64,
}
impl PageQuery {
	/// Window starting at `offset`.
	pub const fn new(offset: u64, limit: u64) -> Self {
		Self { offset, limit }
	}

	/// Window for a 1-based page number.
	pub const fn page(page: u64, page_size: u64) -> Self {
		Self { offset: page.saturating_sub(1).saturating_mul(page_size), limit: page_size }
	}
}

/// Filters accepted by the provider listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderFilter {
	/// 1-based page number.
	pub page: Option<u64>,
	/// Page size.
	pub page_size: Option<u64>,
	/// Name filter.
	pub provider_name: Option<String>,
	/// Channel filter.
	pub channel: Option<u8>,
}

/// Query-string builder appending form-encoded pairs to an endpoint path.
#[derive(Clone, Debug, Default)]
pub struct Query(Vec<(&'static str, String)>);
impl Query {
	/// Adds a pair.
	pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
		self.0.push((key, value.to_string()));

		self
	}

	/// Adds a pair when `value` is present and non-empty.
	pub fn param_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
		match value.map(|v| v.to_string()) {
			Some(value) if !value.is_empty() => self.param(key, value),
			_ => self,
		}
	}

	/// Renders `endpoint?query`, or just `endpoint` when no pairs were added.
	pub fn append_to(&self, endpoint: &str) -> String {
		if self.0.is_empty() {
			return endpoint.to_owned();
		}

		let mut serializer = Serializer::new(String::new());

		for (key, value) in &self.0 {
			serializer.append_pair(key, value);
		}

		format!("{endpoint}?{}", serializer.finish())
	}
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
	id: u64,
	active_status: &'a str,
}

#[derive(Serialize)]
struct OperatorsQuery<'a> {
	#[serde(rename = "businessId")]
	business_id: &'a str,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Pages through business accounts, optionally filtered by name.
	pub async fn search_businesses<T>(&self, page: PageQuery, biz_name: Option<&str>) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		let endpoint = Query::default()
			.param("offset", page.offset)
			.param("limit", page.limit)
			.param_opt("biz_name", biz_name)
			.append_to(BIZ_SEARCH_ENDPOINT);

		self.get(&endpoint).await
	}

	/// Creates a business account.
	pub async fn save_business<T, B>(&self, business: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.post(BIZ_SAVE_ENDPOINT, business).await
	}

	/// Updates a business account.
	pub async fn update_business<T, B>(&self, id: &str, business: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.put(&item_path(BIZ_ITEM_PREFIX, id), business).await
	}

	/// Deletes a business account.
	pub async fn delete_business<T>(&self, id: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.delete(&item_path(BIZ_ITEM_PREFIX, id)).await
	}

	/// Lists the operators attached to a business account.
	pub async fn business_operators<T>(&self, business_id: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.post(BIZ_OPERATORS_ENDPOINT, &OperatorsQuery { business_id }).await
	}

	/// Lists providers; absent or empty filters are omitted.
	pub async fn list_providers<T>(&self, filter: &ProviderFilter) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		let endpoint = Query::default()
			.param_opt("page", filter.page.filter(|p| *p > 0))
			.param_opt("page_size", filter.page_size.filter(|p| *p > 0))
			.param_opt("provider_name", filter.provider_name.as_deref())
			.param_opt("channel", filter.channel.filter(|c| *c > 0))
			.append_to(PROVIDER_LIST_ENDPOINT);

		self.get(&endpoint).await
	}

	/// Fetches one provider.
	pub async fn find_provider<T>(&self, id: u64) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.get(&Query::default().param("id", id).append_to(PROVIDER_FIND_ENDPOINT)).await
	}

	/// Creates or updates a provider.
	pub async fn save_provider<T, B>(&self, provider: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.post(PROVIDER_SAVE_ENDPOINT, provider).await
	}

	/// Toggles a provider's status.
	pub async fn update_provider_status<T>(&self, id: u64, active_status: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.put(PROVIDER_STATUS_ENDPOINT, &StatusUpdate { id, active_status }).await
	}

	/// Deletes a provider.
	pub async fn delete_provider<T>(&self, id: u64) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.delete(&Query::default().param("id", id).append_to(PROVIDER_DELETE_ENDPOINT)).await
	}

	/// Pages through templates, optionally filtered by channel; zero values are omitted.
	pub async fn search_templates<T>(&self, page: PageQuery, channel: Option<u8>) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		let endpoint = Query::default()
			.param_opt("offset", Some(page.offset).filter(|o| *o > 0))
			.param_opt("limit", Some(page.limit).filter(|l| *l > 0))
			.param_opt("channel", channel.filter(|c| *c > 0))
			.append_to(TEMPLATE_SEARCH_ENDPOINT);

		self.get(&endpoint).await
	}

	/// Fetches the configuration of a business account.
	pub async fn find_biz_config<T>(&self, biz_id: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		let endpoint = Query::default().param("biz_id", biz_id).append_to(BIZ_CONFIG_FIND_ENDPOINT);

		self.get(&endpoint).await
	}

	/// Creates or updates the configuration of a business account.
	pub async fn save_biz_config<T, B>(&self, config: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.post(BIZ_CONFIG_SAVE_ENDPOINT, config).await
	}
}

fn item_path(prefix: &str, id: &str) -> String {
	let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();

	format!("{prefix}/{encoded}")
}
