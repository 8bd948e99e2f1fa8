use crate::models::LicenseRisk;

/// Risk tier of a single license identifier. Version qualifiers (`-only`,
/// `-or-later`, trailing `+`) do not change the tier.
pub fn classify_spdx_id(id: &str) -> LicenseRisk {
    let id = id.trim();
    let base = id
        .strip_suffix("-or-later")
        .or_else(|| id.strip_suffix("-only"))
        .or_else(|| id.strip_suffix('+'))
        .unwrap_or(id)
        .to_ascii_uppercase();

    if base.starts_with("AGPL-") || base.starts_with("GPL-") || base == "EUPL-1.1" || base == "SSPL-1.0" {
        return LicenseRisk::StrongCopyleft;
    }
    if base.starts_with("LGPL-")
        || base.starts_with("MPL-")
        || base.starts_with("EPL-")
        || base.starts_with("CDDL-")
        || base == "EUPL-1.2"
        || base == "OSL-3.0"
        || base == "APSL-2.0"
    {
        return LicenseRisk::WeakCopyleft;
    }
    match base.as_str() {
        "MIT" | "MIT-0" | "ISC" | "0BSD" | "APACHE-2.0" | "BSD-2-CLAUSE" | "BSD-3-CLAUSE"
        | "BSD-4-CLAUSE" | "UNLICENSE" | "ZLIB" | "CC0-1.0" | "WTFPL" | "CC-BY-3.0"
        | "CC-BY-4.0" | "PYTHON-2.0" | "PSF-2.0" | "BLUEOAK-1.0.0" | "ARTISTIC-2.0" => {
            LicenseRisk::Permissive
        }
        "UNLICENSED" => LicenseRisk::Proprietary,
        _ => LicenseRisk::Unknown,
    }
}

/// Map common free-text license names onto SPDX identifiers.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let canonical = match trimmed.to_ascii_lowercase().as_str() {
        "apache 2.0" | "apache2" | "apache license 2.0" | "apache license, version 2.0" => {
            "Apache-2.0"
        }
        "mit license" | "the mit license" | "expat" => "MIT",
        "bsd" | "bsd license" | "new bsd" | "modified bsd" | "bsd 3-clause" => "BSD-3-Clause",
        "simplified bsd" | "bsd 2-clause" | "freebsd" => "BSD-2-Clause",
        "gplv2" | "gpl v2" | "gnu gpl v2" => "GPL-2.0",
        "gplv3" | "gpl v3" | "gnu gpl v3" => "GPL-3.0",
        "lgplv2.1" | "lgpl v2.1" => "LGPL-2.1",
        "lgplv3" | "lgpl v3" => "LGPL-3.0",
        "agplv3" | "agpl v3" => "AGPL-3.0",
        "mpl 2.0" | "mplv2" | "mozilla public license 2.0" => "MPL-2.0",
        "isc license" => "ISC",
        "public domain" | "cc0" => "CC0-1.0",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_qualifiers_share_tier() {
        assert_eq!(classify_spdx_id("GPL-3.0-or-later"), LicenseRisk::StrongCopyleft);
        assert_eq!(classify_spdx_id("LGPL-2.1-only"), LicenseRisk::WeakCopyleft);
        assert_eq!(classify_spdx_id("GPL-2.0+"), LicenseRisk::StrongCopyleft);
    }

    #[test]
    fn test_case_insensitive_ids() {
        assert_eq!(classify_spdx_id("mit"), LicenseRisk::Permissive);
        assert_eq!(classify_spdx_id("Apache-2.0"), LicenseRisk::Permissive);
        assert_eq!(classify_spdx_id("UNLICENSED"), LicenseRisk::Proprietary);
        assert_eq!(classify_spdx_id("Custom-1.0"), LicenseRisk::Unknown);
    }

    #[test]
    fn test_normalize_free_text() {
        assert_eq!(normalize("The MIT License"), "MIT");
        assert_eq!(normalize("Apache License, Version 2.0"), "Apache-2.0");
        assert_eq!(normalize("BSD-3-Clause"), "BSD-3-Clause");
    }
}
