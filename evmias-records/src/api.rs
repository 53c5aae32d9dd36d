//! Record fetchers.
//!
//! Each fetcher posts a form to one `c`/`m` endpoint with the session
//! cookies and narrows the payload into a typed record. Non-2xx responses
//! are errors.

use evmias_core::{CookieSet, UpstreamSettings};
use evmias_fetch::{FetchClient, FetchRequest, browser_headers};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::RecordError;
use crate::records::{
    DiseaseRecord, HospitalizationSummary, MovementRecord, OrganizationRecord, PersonRecord,
    ReferralRecord, ServiceRecord,
};
use crate::search::SearchQuery;

/// Typed access to the portal endpoints the bridge reads.
#[derive(Debug, Clone)]
pub struct UpstreamApi {
    client: FetchClient,
    upstream: UpstreamSettings,
}

impl UpstreamApi {
    /// Creates an API over a shared client.
    pub fn new(client: FetchClient, upstream: UpstreamSettings) -> Self {
        Self { client, upstream }
    }

    /// Upstream settings in use.
    pub fn upstream(&self) -> &UpstreamSettings {
        &self.upstream
    }

    /// Patient demographics.
    #[instrument(skip(self, cookies))]
    pub async fn person(&self, cookies: &CookieSet, person_id: &str) -> Result<PersonRecord, RecordError> {
        let form = [
            ("Person_id", person_id),
            ("LoadShort", "True"),
            ("mode", "PersonInfoPanel"),
        ];
        let payload = self.post("person", cookies, "Common", "loadPersonData", form).await?;
        first_row("person", &payload)
    }

    /// First ward movement of a hospitalization.
    #[instrument(skip(self, cookies))]
    pub async fn movement(&self, cookies: &CookieSet, event_id: &str) -> Result<MovementRecord, RecordError> {
        let form = [("EvnSection_pid", event_id)];
        let payload = self.post("movement", cookies, "EvnSection", "loadEvnSectionGrid", form).await?;
        first_row("movement", &payload)
    }

    /// Admission card of a hospitalization.
    #[instrument(skip(self, cookies))]
    pub async fn referral(&self, cookies: &CookieSet, event_id: &str) -> Result<ReferralRecord, RecordError> {
        let attr_objects = attr_objects("EvnPSEditWindow", "EvnPS_id");
        let form = [
            ("EvnPS_id", event_id),
            ("archiveRecord", "0"),
            ("delDocsView", "0"),
            ("attrObjects", attr_objects.as_str()),
        ];
        let payload = self.post("referral", cookies, "EvnPS", "loadEvnPSEditForm", form).await?;
        first_row("referral", &payload)
    }

    /// Discharge form of a movement.
    #[instrument(skip(self, cookies))]
    pub async fn disease(&self, cookies: &CookieSet, section_id: &str) -> Result<DiseaseRecord, RecordError> {
        let attr_objects = attr_objects("EvnSectionEditWindow", "EvnSection_id");
        let form = [
            ("EvnSection_id", section_id),
            ("archiveRecord", "0"),
            ("attrObjects", attr_objects.as_str()),
        ];
        let payload = self
            .post("disease", cookies, "EvnSection", "loadEvnSectionEditForm", form)
            .await?;
        let fields = payload
            .get("fieldsData")
            .ok_or(RecordError::NotFound { resource: "disease" })?;
        first_row("disease", fields)
    }

    /// Organization by identifier.
    #[instrument(skip(self, cookies))]
    pub async fn organization(&self, cookies: &CookieSet, org_id: &str) -> Result<OrganizationRecord, RecordError> {
        let form = [("Org_id", org_id)];
        let payload = self.post("organization", cookies, "Org", "getOrgList", form).await?;
        first_row("organization", &payload)
    }

    /// Every service rendered during a hospitalization.
    #[instrument(skip(self, cookies))]
    pub async fn services(&self, cookies: &CookieSet, event_id: &str) -> Result<Vec<ServiceRecord>, RecordError> {
        let form = [("pid", event_id), ("parent", "EvnPS")];
        let payload = self.post("services", cookies, "EvnUsluga", "loadEvnUslugaGrid", form).await?;
        narrow("services", &payload)
    }

    /// Hospitalizations matching a search.
    #[instrument(skip(self, cookies, query), fields(last_name = %query.last_name))]
    pub async fn search(
        &self,
        cookies: &CookieSet,
        query: &SearchQuery,
    ) -> Result<Vec<HospitalizationSummary>, RecordError> {
        let form = query.form_fields(
            self.upstream.search_period_start.as_deref(),
            chrono::Local::now().date_naive(),
        )?;
        let payload = self.post("search", cookies, "Search", "searchData", form).await?;
        let rows = payload
            .get("data")
            .filter(|rows| rows.is_array())
            .ok_or_else(|| RecordError::Shape {
                resource: "search",
                message: "expected a `data` array".to_string(),
            })?;
        let rows: Vec<HospitalizationSummary> = narrow("search", rows)?;
        debug!(rows = rows.len(), "Search finished");
        Ok(rows)
    }

    /// Posts a form to any `c`/`m` endpoint and returns the raw payload.
    pub async fn call<I, K, V>(
        &self,
        cookies: &CookieSet,
        controller: &str,
        method: &str,
        form: I,
    ) -> Result<Value, RecordError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.post("call", cookies, controller, method, form).await
    }

    async fn post<I, K, V>(
        &self,
        resource: &'static str,
        cookies: &CookieSet,
        controller: &str,
        method: &str,
        form: I,
    ) -> Result<Value, RecordError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = FetchRequest::post(&self.upstream.base_url)
            .controller(controller, method)
            .headers(browser_headers(&self.upstream))
            .form(form)
            .cookies(cookies);
        let result = self.client.fetch(request).await?;
        result.json.ok_or(RecordError::NoPayload { resource })
    }
}

fn attr_objects(window: &str, ident_field: &str) -> String {
    serde_json::json!([{ "object": window, "identField": ident_field }]).to_string()
}

fn narrow<T: DeserializeOwned>(resource: &'static str, value: &Value) -> Result<T, RecordError> {
    serde_json::from_value(value.clone()).map_err(|e| RecordError::Shape {
        resource,
        message: e.to_string(),
    })
}

fn first_row<T: DeserializeOwned>(resource: &'static str, payload: &Value) -> Result<T, RecordError> {
    let rows = payload.as_array().ok_or_else(|| RecordError::Shape {
        resource,
        message: "expected an array".to_string(),
    })?;
    let row = rows.first().ok_or(RecordError::NotFound { resource })?;
    narrow(resource, row)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api, cookies};
    use evmias_fetch::testing::MockTransport;
    use evmias_fetch::{FetchError, RawResponse};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_person_request_and_narrowing() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(
                200,
                &json!([{"Person_id": 42, "Person_Surname": "IVANOV", "Sex_Name": "M"}]),
            ))
        }));

        let person = api(&transport).person(&cookies(), "42").await.unwrap();

        assert_eq!(person.person_id.as_deref(), Some("42"));
        assert_eq!(person.last_name.as_deref(), Some("IVANOV"));

        let call = &transport.calls()[0].request;
        assert_eq!(transport.endpoints(), vec!["Common/loadPersonData".to_string()]);
        assert_eq!(call.form_value("Person_id"), Some("42"));
        assert_eq!(call.form_value("LoadShort"), Some("True"));
        assert_eq!(call.cookie_set(), &cookies());
        assert!(call.raises_for_status());
        assert_eq!(call.header_value("Referer"), Some("https://portal.example/?c=promed"));
    }

    #[tokio::test]
    async fn test_disease_reads_fields_data() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(
                200,
                &json!({"fieldsData": [{"ResultDesease_id": "3", "DeseaseType_id": 1}]}),
            ))
        }));

        let disease = api(&transport).disease(&cookies(), "900").await.unwrap();

        assert_eq!(disease.outcome_id.as_deref(), Some("3"));
        assert_eq!(disease.disease_type_id.as_deref(), Some("1"));
        let attr = transport.calls()[0].request.form_value("attrObjects").map(str::to_string);
        assert_eq!(
            attr.as_deref(),
            Some(r#"[{"identField":"EvnSection_id","object":"EvnSectionEditWindow"}]"#)
        );
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::json(200, &json!([])))));

        let err = api(&transport).movement(&cookies(), "1").await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound { resource: "movement" }));
    }

    #[tokio::test]
    async fn test_html_page_is_no_payload() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::text(200, "text/html", "<html>login</html>"))
        }));

        let err = api(&transport).organization(&cookies(), "77").await.unwrap_err();
        assert!(matches!(err, RecordError::NoPayload { .. }));
    }

    #[tokio::test]
    async fn test_client_error_propagates() {
        let transport = Arc::new(MockTransport::new(|_| Ok(RawResponse::new(403))));

        let err = api(&transport).services(&cookies(), "1").await.unwrap_err();
        assert!(matches!(
            err,
            RecordError::Fetch(FetchError::Status { status: 403, .. })
        ));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_search_reads_data_rows() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::text(
                200,
                "text/html",
                r#"{"data": [{"Person_id": "1", "EvnPS_id": "10"}, {"Person_id": "2", "EvnPS_id": "20"}], "totalCount": 2}"#,
            ))
        }));
        let query = SearchQuery::new("IVANOV").discharge_range("01.01.2026 - 31.01.2026");

        let rows = api(&transport).search(&cookies(), &query).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].event_id.as_deref(), Some("20"));
        let call = &transport.calls()[0].request;
        assert_eq!(call.form_value("Person_Surname"), Some("IVANOV"));
        assert_eq!(call.form_value("EvnSection_disDate_Range"), Some("01.01.2026 - 31.01.2026"));
    }

    #[tokio::test]
    async fn test_search_without_data_is_shape_error() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(200, &json!({"success": false})))
        }));

        let err = api(&transport)
            .search(&cookies(), &SearchQuery::new("IVANOV"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Shape { resource: "search", .. }));
    }
}
