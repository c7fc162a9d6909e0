//! Which configuration category an upload belongs to.

use hotstage_session::ConfigCategory;

/// Marker for the client configuration tree.
pub const CLIENT_CONFIG: &str = "ClientConfig";

/// Marker for the server configuration tree.
pub const SERVER_CONFIG: &str = "ServerConfig";

/// Classify an upload by its target directory and file path.
///
/// Under `ClientConfig`, `.xml` files are client XML and `.db` files are
/// client databases; anything else there is not configuration. Everything
/// under `ServerConfig` is server configuration. Other trees are not
/// tracked.
pub fn classify_upload(dir: &str, path: &str) -> Option<ConfigCategory> {
    if dir.contains(CLIENT_CONFIG) {
        if path.ends_with(".xml") {
            Some(ConfigCategory::ClientXml)
        } else if path.ends_with(".db") {
            Some(ConfigCategory::ClientDb)
        } else {
            None
        }
    } else if dir.contains(SERVER_CONFIG) {
        Some(ConfigCategory::Server)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let dir = "/wedo/ClientConfig/CSCommon/DB";
        assert_eq!(
            classify_upload(dir, "/root/wedo/ClientConfig/CSCommon/DB/CommonExcel.db"),
            Some(ConfigCategory::ClientDb)
        );
        assert_eq!(
            classify_upload(dir, "/root/wedo/ClientConfig/CSCommon/DB/SvrLoadList.xml"),
            Some(ConfigCategory::ClientXml)
        );
        assert_eq!(classify_upload(dir, "/root/wedo/ClientConfig/readme.txt"), None);
    }

    #[test]
    fn test_server_config_ignores_suffix() {
        let dir = "/wedo/ServerConfig";
        for path in ["/x/a.xml", "/x/a.db", "/x/a.lua"] {
            assert_eq!(classify_upload(dir, path), Some(ConfigCategory::Server));
        }
    }

    #[test]
    fn test_other_trees_untracked() {
        assert_eq!(classify_upload("/wedo/Art", "/x/a.xml"), None);
        assert_eq!(classify_upload("/", "/x/a.db"), None);
    }
}
