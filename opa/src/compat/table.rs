//! Static compatibility tables.
//!
//! Which xtrabackup release belongs to which MySQL release, and where to get
//! the matching Debian package for the supported distributions.

const BASE_24: &str =
    "https://downloads.percona.com/downloads/Percona-XtraBackup-2.4/Percona-XtraBackup-2.4.29/binary/debian";
const BASE_80: &str =
    "https://downloads.percona.com/downloads/Percona-XtraBackup-8.0/Percona-XtraBackup-8.0.35-33/binary/debian";
const BASE_82: &str = "https://downloads.percona.com/downloads/Percona-XtraBackup-innovative-release/Percona-XtraBackup-8.2.0-1/binary/debian";
const BASE_84: &str =
    "https://downloads.percona.com/downloads/Percona-XtraBackup-8.4/Percona-XtraBackup-8.4.0-3/binary/debian";

/// Supported distributions: (name, version, codename).
const DISTROS: &[(&str, &str, &str)] = &[
    ("debian", "11", "bullseye"),
    ("debian", "12", "bookworm"),
    ("ubuntu", "20.04", "focal"),
    ("ubuntu", "22.04", "jammy"),
    ("ubuntu", "24.04", "noble"),
];

/// xtrabackup major.minor required for a MySQL major.minor.
pub fn required_xtrabackup_version(mysql_version: &str) -> Option<&'static str> {
    match mysql_version {
        "5.6" | "5.7" => Some("2.4"),
        "8.0" => Some("8.0"),
        "8.2" => Some("8.2"),
        "8.4" => Some("8.4"),
        _ => None,
    }
}

/// Download locator of the xtrabackup package for a distribution and MySQL
/// version, if the combination is known.
pub fn download_url(mysql_version: &str, distro_name: &str, distro_version: &str) -> Option<String> {
    let (_, _, codename) = DISTROS
        .iter()
        .find(|(name, version, _)| *name == distro_name && *version == distro_version)?;

    // Noble has no 2.4 or 8.2 packages; the jammy builds are used there.
    let pkg_codename = match (*codename, mysql_version) {
        ("noble", "5.6" | "5.7" | "8.2") => "jammy",
        (codename, _) => codename,
    };

    let url = match mysql_version {
        "5.6" | "5.7" => format!(
            "{BASE_24}/{c}/x86_64/percona-xtrabackup-24_2.4.29-1.{c}_amd64.deb",
            c = pkg_codename
        ),
        "8.0" => format!(
            "{BASE_80}/{c}/x86_64/percona-xtrabackup-80_8.0.35-33-1.{c}_amd64.deb",
            c = pkg_codename
        ),
        "8.2" => format!(
            "{BASE_82}/{c}/x86_64/percona-xtrabackup-82_8.2.0-1-1.{c}_amd64.deb",
            c = pkg_codename
        ),
        "8.4" => format!(
            "{BASE_84}/{c}/x86_64/percona-xtrabackup-84_8.4.0-3-1.{c}_amd64.deb",
            c = pkg_codename
        ),
        _ => return None,
    };

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_versions() {
        assert_eq!(required_xtrabackup_version("5.6"), Some("2.4"));
        assert_eq!(required_xtrabackup_version("5.7"), Some("2.4"));
        assert_eq!(required_xtrabackup_version("8.0"), Some("8.0"));
        assert_eq!(required_xtrabackup_version("8.2"), Some("8.2"));
        assert_eq!(required_xtrabackup_version("8.4"), Some("8.4"));
        assert_eq!(required_xtrabackup_version("8.1"), None);
        assert_eq!(required_xtrabackup_version("10.6"), None);
    }

    #[test]
    fn test_download_urls() {
        assert_eq!(
            download_url("8.0", "debian", "12").as_deref(),
            Some(
                "https://downloads.percona.com/downloads/Percona-XtraBackup-8.0/Percona-XtraBackup-8.0.35-33/binary/debian/bookworm/x86_64/percona-xtrabackup-80_8.0.35-33-1.bookworm_amd64.deb"
            )
        );
        assert_eq!(
            download_url("5.7", "ubuntu", "20.04").as_deref(),
            Some(
                "https://downloads.percona.com/downloads/Percona-XtraBackup-2.4/Percona-XtraBackup-2.4.29/binary/debian/focal/x86_64/percona-xtrabackup-24_2.4.29-1.focal_amd64.deb"
            )
        );
    }

    #[test]
    fn test_noble_falls_back_to_jammy_packages() {
        let url_24 = download_url("5.6", "ubuntu", "24.04").unwrap();
        assert!(url_24.contains("/jammy/") && url_24.ends_with("2.4.29-1.jammy_amd64.deb"));

        let url_82 = download_url("8.2", "ubuntu", "24.04").unwrap();
        assert!(url_82.contains("/jammy/"));

        let url_84 = download_url("8.4", "ubuntu", "24.04").unwrap();
        assert!(url_84.ends_with("percona-xtrabackup-84_8.4.0-3-1.noble_amd64.deb"));
    }

    #[test]
    fn test_unknown_combinations() {
        assert!(download_url("8.0", "fedora", "40").is_none());
        assert!(download_url("8.0", "debian", "10").is_none());
        assert!(download_url("10.6", "debian", "12").is_none());
    }
}
