use crate::core::error::FetchError;
use crate::core::provider::{ParsedRow, RateProvider, RawPayload};
use crate::core::rate::ProviderDescriptor;
use crate::providers::html::{ColumnLayout, ensure_anchor};
use crate::providers::http::PageClient;
use async_trait::async_trait;

pub const WOORI_KEY: &str = "korea.woori";
pub const WOORI_URL: &str = "https://spot.wooribank.com/pot/Dream?withyou=FXXRT0011";

const ROW_SELECTOR: &str = "table.table_type01 > tbody > tr";
// Woori lists the code before the name.
const LAYOUT: ColumnLayout = ColumnLayout {
    code: 0,
    name: 1,
    cash_buy: 2,
    cash_sell: 4,
};

pub struct WooriProvider {
    url: String,
    client: PageClient,
}

impl WooriProvider {
    pub fn new(url: &str, client: PageClient) -> Self {
        WooriProvider {
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl RateProvider for WooriProvider {
    fn identify(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(WOORI_KEY, "Woori Bank (Korea)", "KR", "KRW").with_source_url(&self.url)
    }

    async fn fetch_raw(&self) -> Result<RawPayload, FetchError> {
        let payload = self.client.fetch_page(WOORI_KEY, &self.url).await?;
        ensure_anchor(WOORI_KEY, &payload.body, ROW_SELECTOR)?;
        Ok(payload)
    }

    fn parse(&self, payload: &RawPayload) -> Result<Vec<ParsedRow>, FetchError> {
        LAYOUT.extract(WOORI_KEY, &payload.body, ROW_SELECTOR)
    }
}
