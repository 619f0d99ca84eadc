//! Service ContentDirectory:1
//!
//! Browse et Search sur la projection du système de fichiers, capacités
//! fixes, et les deux extensions Samsung `X_*` attendues par leurs TV.

use crate::objects::Entry;
use crate::search::SearchCriteria;
use crate::services::ActionContext;
use fmsdidl::{DidlLite, Filter};
use fmsupnp::soap::SoapAction;
use fmsupnp::UpnpError;
use tracing::debug;

/// Capacités de recherche annoncées
pub const SEARCH_CAPABILITIES: &str = "upnp:class,dc:title";

/// Capacités de tri annoncées : l'ordre de browse est fixe
pub const SORT_CAPABILITIES: &str = "dc:title";

/// Feature list Samsung minimale : de quoi laisser la TV lancer un browse
/// des racines audio/vidéo/image, toutes confondues avec la racine.
const SAMSUNG_FEATURE_LIST: &str = r#"<Features xmlns="urn:schemas-upnp-org:av:avs" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="urn:schemas-upnp-org:av:avs http://www.upnp.org/schemas/av/avs.xsd"><Feature name="samsung.com.pv.extension" version="1"><objectIDs>0</objectIDs></Feature></Features>"#;

/// Traite une action ContentDirectory.
pub async fn handle(
    ctx: &ActionContext<'_>,
    action_name: &str,
    action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    match action_name {
        "Browse" => browse(ctx, action).await,
        "Search" => search(ctx, action).await,
        "GetSearchCapabilities" => Ok(vec![(
            "SearchCaps".to_string(),
            SEARCH_CAPABILITIES.to_string(),
        )]),
        "GetSortCapabilities" => Ok(vec![(
            "SortCaps".to_string(),
            SORT_CAPABILITIES.to_string(),
        )]),
        "GetSystemUpdateID" => Ok(vec![("Id".to_string(), "0".to_string())]),
        "X_GetFeatureList" => Ok(vec![(
            "FeatureList".to_string(),
            SAMSUNG_FEATURE_LIST.to_string(),
        )]),
        // Accepté et oublié : on ne persiste pas les positions de lecture
        "X_SetBookmark" => Ok(Vec::new()),
        other => Err(UpnpError::invalid_action(format!(
            "Unknown ContentDirectory action: {}",
            other
        ))),
    }
}

/// Fenêtre de pagination commune à Browse et Search.
///
/// `requested_count == 0` signifie « tout » ; un index de départ au-delà du
/// total produit une page vide mais garde le total exact.
fn paginate(entries: Vec<Entry>, starting_index: u32, requested_count: u32) -> (Vec<Entry>, u32) {
    let total = entries.len() as u32;
    let start = starting_index.min(total) as usize;
    let end = if requested_count == 0 {
        total as usize
    } else {
        (starting_index.saturating_add(requested_count)).min(total) as usize
    };
    let page = entries.into_iter().take(end).skip(start).collect();
    (page, total)
}

fn marshal(entries: Vec<Entry>, filter: &Filter) -> Result<String, UpnpError> {
    let mut didl = DidlLite::new();
    for entry in entries {
        match entry {
            Entry::Container(c) => didl.containers.push(c),
            Entry::Item(i) => didl.items.push(i),
        }
    }
    filter.apply(&mut didl);
    didl.to_xml()
        .map_err(|e| UpnpError::action_failed(format!("DIDL-Lite marshal failed: {}", e)))
}

fn browse_result(
    entries: Vec<Entry>,
    filter: &Filter,
    starting_index: u32,
    requested_count: u32,
) -> Result<Vec<(String, String)>, UpnpError> {
    let (page, total) = paginate(entries, starting_index, requested_count);
    let returned = page.len() as u32;
    let didl = marshal(page, filter)?;
    Ok(vec![
        ("Result".to_string(), didl),
        ("NumberReturned".to_string(), returned.to_string()),
        ("TotalMatches".to_string(), total.to_string()),
        ("UpdateID".to_string(), "0".to_string()),
    ])
}

async fn browse(
    ctx: &ActionContext<'_>,
    action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    let object_id = action.arg("ObjectID");
    let browse_flag = action.arg("BrowseFlag");
    let filter = Filter::parse(action.arg("Filter"));
    let starting_index = action.arg_u32("StartingIndex", 0);
    let requested_count = action.arg_u32("RequestedCount", 0);
    debug!(
        "Browse {} {} start={} count={}",
        browse_flag, object_id, starting_index, requested_count
    );

    match browse_flag {
        "BrowseDirectChildren" => {
            let entries = ctx
                .state
                .browse_direct_children(object_id, ctx.host, ctx.user_agent)
                .await?;
            browse_result(entries, &filter, starting_index, requested_count)
        }
        "BrowseMetadata" => {
            let entry = ctx
                .state
                .browse_metadata(object_id, ctx.host, ctx.user_agent)
                .await?;
            browse_result(vec![entry], &filter, 0, 0)
        }
        other => Err(UpnpError::invalid_args(format!(
            "Unknown BrowseFlag: {}",
            other
        ))),
    }
}

async fn search(
    ctx: &ActionContext<'_>,
    action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    let container_id = action.arg("ContainerID");
    let criteria = SearchCriteria::parse(action.arg("SearchCriteria"));
    let filter = Filter::parse(action.arg("Filter"));
    let starting_index = action.arg_u32("StartingIndex", 0);
    let requested_count = action.arg_u32("RequestedCount", 0);
    debug!("Search {} {:?}", container_id, criteria);

    let entries = ctx
        .state
        .search(container_id, &criteria, ctx.host, ctx.user_agent)
        .await?;
    browse_result(entries, &filter, starting_index, requested_count)
}

/// SCPD du service ContentDirectory:1
pub const SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>Browse</name>
      <argumentList>
        <argument><name>ObjectID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ObjectID</relatedStateVariable></argument>
        <argument><name>BrowseFlag</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_BrowseFlag</relatedStateVariable></argument>
        <argument><name>Filter</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Filter</relatedStateVariable></argument>
        <argument><name>StartingIndex</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Index</relatedStateVariable></argument>
        <argument><name>RequestedCount</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>SortCriteria</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_SortCriteria</relatedStateVariable></argument>
        <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
        <argument><name>NumberReturned</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>TotalMatches</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>UpdateID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_UpdateID</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>Search</name>
      <argumentList>
        <argument><name>ContainerID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ObjectID</relatedStateVariable></argument>
        <argument><name>SearchCriteria</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_SearchCriteria</relatedStateVariable></argument>
        <argument><name>Filter</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Filter</relatedStateVariable></argument>
        <argument><name>StartingIndex</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Index</relatedStateVariable></argument>
        <argument><name>RequestedCount</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>SortCriteria</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_SortCriteria</relatedStateVariable></argument>
        <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
        <argument><name>NumberReturned</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>TotalMatches</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
        <argument><name>UpdateID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_UpdateID</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>GetSearchCapabilities</name>
      <argumentList>
        <argument><name>SearchCaps</name><direction>out</direction><relatedStateVariable>SearchCapabilities</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>GetSortCapabilities</name>
      <argumentList>
        <argument><name>SortCaps</name><direction>out</direction><relatedStateVariable>SortCapabilities</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>GetSystemUpdateID</name>
      <argumentList>
        <argument><name>Id</name><direction>out</direction><relatedStateVariable>SystemUpdateID</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>X_GetFeatureList</name>
      <argumentList>
        <argument><name>FeatureList</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Featurelist</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>X_SetBookmark</name>
      <argumentList>
        <argument><name>CategoryType</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_CategoryType</relatedStateVariable></argument>
        <argument><name>RID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_RID</relatedStateVariable></argument>
        <argument><name>ObjectID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ObjectID</relatedStateVariable></argument>
        <argument><name>PosSecond</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_PosSec</relatedStateVariable></argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_ObjectID</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_BrowseFlag</name><dataType>string</dataType>
      <allowedValueList><allowedValue>BrowseMetadata</allowedValue><allowedValue>BrowseDirectChildren</allowedValue></allowedValueList>
    </stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Filter</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_SortCriteria</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_SearchCriteria</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Index</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Count</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_UpdateID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Result</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Featurelist</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_CategoryType</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_RID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_PosSec</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>SearchCapabilities</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>SortCapabilities</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>SystemUpdateID</name><dataType>ui4</dataType></stateVariable>
  </serviceStateTable>
</scpd>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use fmsdidl::{classes, Container};

    fn containers(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| {
                Entry::Container(Container {
                    id: format!("/d{}", i),
                    parent_id: "0".to_string(),
                    restricted: "1".to_string(),
                    child_count: None,
                    title: format!("d{}", i),
                    class: classes::STORAGE_FOLDER.to_string(),
                })
            })
            .collect()
    }

    #[test]
    fn test_paginate_zero_count_returns_all() {
        let (page, total) = paginate(containers(5), 0, 0);
        assert_eq!(page.len(), 5);
        assert_eq!(total, 5);
    }

    #[test]
    fn test_paginate_window() {
        let (page, total) = paginate(containers(5), 1, 2);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id(), "/d1");
        assert_eq!(page[1].id(), "/d2");
    }

    #[test]
    fn test_paginate_start_beyond_total() {
        let (page, total) = paginate(containers(3), 10, 5);
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn test_paginate_count_overflow_is_clamped() {
        let (page, total) = paginate(containers(3), 2, u32::MAX);
        assert_eq!(page.len(), 1);
        assert_eq!(total, 3);
    }
}
