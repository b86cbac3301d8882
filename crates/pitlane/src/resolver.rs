//! Driver identities for a range of seasons.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SeasonRange};
use crate::error::PipelineError;
use crate::parser::{DriverName, parse_driver_detail, parse_driver_list};
use crate::scraper::Fetch;
use crate::store::CacheStore;
use crate::types::{DriverEntry, DriverIdentity};

/// Drivers whose detail document stores the family name in `givenName` and
/// the given name in `familyName`.
const REVERSED_NAME_DRIVERS: &[&str] = &["zhou"];

#[derive(Debug, thiserror::Error)]
#[error("Driver '{0}' is not in the resolved driver mapping")]
pub struct LookupError(pub String);

pub fn drivers_key(range: &SeasonRange) -> String {
    format!("drivers_{}.json", range.cache_label())
}

/// Composes the display name of a driver from its detail document fields.
pub fn display_name(driver_id: &str, name: DriverName) -> String {
    let DriverName {
        mut given_name,
        mut family_name,
    } = name;

    if REVERSED_NAME_DRIVERS.contains(&driver_id) {
        std::mem::swap(&mut given_name, &mut family_name);
    }

    format!("{} {}", given_name, family_name)
}

/// Mapping from driver id to permanent number and display name. Serializes as
/// the JSON object stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverDirectory {
    drivers: BTreeMap<String, DriverEntry>,
}

impl DriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, driver_id: &str) -> bool {
        self.drivers.contains_key(driver_id)
    }

    pub fn insert(&mut self, driver_id: impl Into<String>, number: i32, name: impl Into<String>) {
        self.drivers.insert(
            driver_id.into(),
            DriverEntry {
                number,
                name: name.into(),
            },
        );
    }

    pub fn lookup(&self, driver_id: &str) -> Result<DriverIdentity, LookupError> {
        self.drivers
            .get(driver_id)
            .map(|entry| DriverIdentity {
                driver_id: driver_id.to_string(),
                number: entry.number,
                name: entry.name.clone(),
            })
            .ok_or_else(|| LookupError(driver_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

pub struct DriverResolver<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, F: Fetch, S: CacheStore> DriverResolver<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, config: &'a PipelineConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Builds the driver mapping of the configured seasons, or loads it from the
    /// cache unless a refresh is configured. Each driver's detail document is
    /// fetched once, the first time the driver appears in a season list.
    pub async fn resolve(&self) -> Result<DriverDirectory, PipelineError> {
        let range = &self.config.seasons;
        let key = drivers_key(range);

        if !self.config.refresh
            && let Some(directory) = self.store.get_json::<DriverDirectory>(&key)?
        {
            log::info!("Using cached driver mapping {} ({} drivers)", key, directory.len());
            return Ok(directory);
        }

        let mut directory = DriverDirectory::new();

        for season in range.seasons() {
            let url = self.config.driver_list_url(season);
            log::info!("Fetching driver list for season {}", season);
            let body = self.fetcher.fetch_body(&url).await?;

            for (driver_id, number) in parse_driver_list(&body) {
                if directory.contains(&driver_id) {
                    continue;
                }

                let detail_url = self.config.driver_detail_url(&driver_id);
                log::debug!("Fetching driver detail {}", detail_url);
                let json = self.fetcher.fetch_page(&detail_url).await?;
                let name = display_name(&driver_id, parse_driver_detail(&json)?);
                directory.insert(driver_id, number, name);
            }
        }

        log::info!("Resolved {} drivers for {}", directory.len(), range);
        self.store.put_json(&key, &directory)?;
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::stub::StubFetcher;
    use crate::store::MemoryStore;
    use crate::types::UNASSIGNED_NUMBER;

    fn detail(driver_id: &str, given: &str, family: &str) -> String {
        format!(
            r#"{{"MRData":{{"DriverTable":{{"driverId":"{driver_id}","Drivers":[{{"driverId":"{driver_id}","givenName":"{given}","familyName":"{family}"}}]}}}}}}"#
        )
    }

    fn fetcher() -> StubFetcher {
        StubFetcher::new()
            .with_page(
                "https://ergast.com/api/f1/2022/drivers",
                r#"<DriverTable season="2022">
<Driver driverId="hamilton" code="HAM">
<PermanentNumber>44</PermanentNumber>
</Driver>
<Driver driverId="zhou" code="ZHO">
<PermanentNumber>24</PermanentNumber>
</Driver>
</DriverTable>"#,
            )
            .with_page(
                "https://ergast.com/api/f1/2023/drivers",
                r#"<DriverTable season="2023">
<Driver driverId="hamilton" code="HAM">
<PermanentNumber>44</PermanentNumber>
</Driver>
<Driver driverId="de_vries" code="DEV">
<GivenName>Nyck</GivenName>
</Driver>
</DriverTable>"#,
            )
            .with_page(
                "https://ergast.com/api/f1/drivers/hamilton.json",
                detail("hamilton", "Lewis", "Hamilton"),
            )
            .with_page(
                "https://ergast.com/api/f1/drivers/zhou.json",
                detail("zhou", "Guanyu", "Zhou"),
            )
            .with_page(
                "https://ergast.com/api/f1/drivers/de_vries.json",
                detail("de_vries", "Nyck", "de Vries"),
            )
    }

    #[test]
    fn test_display_name_swaps_reversed_fields() {
        let source = DriverName {
            given_name: "Guanyu".to_string(),
            family_name: "Zhou".to_string(),
        };
        assert_eq!(display_name("zhou", source.clone()), "Zhou Guanyu");
        assert_eq!(display_name("other", source), "Guanyu Zhou");
    }

    #[tokio::test]
    async fn test_resolve_fetches_each_driver_once() {
        let fetcher = fetcher();
        let store = MemoryStore::new();
        let config = PipelineConfig {
            seasons: SeasonRange::new(2022, 2023).unwrap(),
            ..Default::default()
        };

        let directory = DriverResolver::new(&fetcher, &store, &config)
            .resolve()
            .await
            .unwrap();

        assert_eq!(directory.len(), 3);
        assert_eq!(
            fetcher.request_count("https://ergast.com/api/f1/drivers/hamilton.json"),
            1
        );

        let hamilton = directory.lookup("hamilton").unwrap();
        assert_eq!(hamilton.number, 44);
        assert_eq!(hamilton.name, "Lewis Hamilton");

        let zhou = directory.lookup("zhou").unwrap();
        assert_eq!(zhou.number, 24);
        assert_eq!(zhou.name, "Zhou Guanyu");

        let de_vries = directory.lookup("de_vries").unwrap();
        assert_eq!(de_vries.number, UNASSIGNED_NUMBER);
        assert_eq!(de_vries.name, "Nyck de Vries");

        assert!(matches!(directory.lookup("schumacher"), Err(LookupError(id)) if id == "schumacher"));
    }

    #[tokio::test]
    async fn test_resolve_caches_the_mapping() {
        let fetcher = fetcher();
        let store = MemoryStore::new();
        let mut config = PipelineConfig {
            seasons: SeasonRange::single(2022),
            ..Default::default()
        };
        let resolver = DriverResolver::new(&fetcher, &store, &config);

        let built = resolver.resolve().await.unwrap();
        let json = String::from_utf8(store.get("drivers_2022_2022.json").unwrap().unwrap()).unwrap();
        assert!(json.contains(r#""zhou": {"#));
        assert!(json.contains(r#""name": "Zhou Guanyu""#));
        assert!(json.contains(r#""number": 24"#));

        let requests = fetcher.requests().len();
        let loaded = resolver.resolve().await.unwrap();
        assert_eq!(built, loaded);
        assert_eq!(fetcher.requests().len(), requests);

        config.refresh = true;
        DriverResolver::new(&fetcher, &store, &config)
            .resolve()
            .await
            .unwrap();
        assert!(fetcher.requests().len() > requests);
    }
}
