use crate::core::error::FetchError;
use crate::core::provider::{ParsedRow, RateProvider, RawPayload};
use crate::core::rate::ProviderDescriptor;
use crate::providers::html::{ColumnLayout, ensure_anchor};
use crate::providers::http::PageClient;
use async_trait::async_trait;

pub const HANA_KEY: &str = "korea.hana";
pub const HANA_URL: &str = "https://www.kebhana.com/cont/mall/mall15/mall1501/index.jsp";

const ROW_SELECTOR: &str = "#p_grid1_tb > tbody > tr";
const LAYOUT: ColumnLayout = ColumnLayout {
    name: 0,
    code: 1,
    cash_buy: 2,
    cash_sell: 4,
};

/// KEB Hana Bank notice rates page.
pub struct HanaProvider {
    url: String,
    client: PageClient,
}

impl HanaProvider {
    pub fn new(url: &str, client: PageClient) -> Self {
        HanaProvider {
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl RateProvider for HanaProvider {
    fn identify(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(HANA_KEY, "KEB Hana Bank (Korea)", "KR", "KRW").with_source_url(&self.url)
    }

    async fn fetch_raw(&self) -> Result<RawPayload, FetchError> {
        let payload = self.client.fetch_page(HANA_KEY, &self.url).await?;
        ensure_anchor(HANA_KEY, &payload.body, ROW_SELECTOR)?;
        Ok(payload)
    }

    fn parse(&self, payload: &RawPayload) -> Result<Vec<ParsedRow>, FetchError> {
        LAYOUT.extract(HANA_KEY, &payload.body, ROW_SELECTOR)
    }
}
