//! National service codes (`cTribNac`, LC 116/2003 list) with special fiscal treatment.
//!
//! Both tables are sorted for binary search.

/// Service code whose ISSQN is due to the customer's municipality.
pub const CUSTOMER_MUNICIPALITY_CODE: &str = "170501";

/// Check whether a service may be taxed below the minimum ISSQN rate.
pub fn is_rate_floor_exempt(code: &str) -> bool {
    RATE_FLOOR_EXEMPT.binary_search(&code).is_ok()
}

/// Check whether ISSQN for this service is due where the service is performed.
pub fn is_taxed_at_service_location(code: &str) -> bool {
    SERVICE_LOCATION_CODES.binary_search(&code).is_ok()
}

/// Civil construction, transport, health, and similar services (LC 116 art. 8-A §1).
static RATE_FLOOR_EXEMPT: &[&str] = &[
    "042201", "042301", "050901", "070201", "070202", "070501", "070502", "090201", "090202",
    "100101", "100102", "100103", "100104", "100105", "100201", "100202", "100301", "100401",
    "100402", "100403", "100501", "100502", "100601", "100701", "100801", "100901", "101001",
    "150101", "150102", "150103", "150104", "150105", "151001", "151002", "151003", "151004",
    "151005", "160101", "160102", "160103", "160104", "160201", "170501", "170601", "171001",
    "171002", "171101", "171102", "171201", "210101", "250301",
];

/// LC 116 art. 3 exceptions: tax is due at the place of the service.
static SERVICE_LOCATION_CODES: &[&str] = &[
    "030401", "030402", "030403", "030501", "070201", "070202", "070401", "070501", "070502",
    "070901", "070902", "071001", "071002", "071101", "071102", "071201", "071601", "071701",
    "071801", "071901", "110101", "110102", "110201", "110301", "110401", "110402", "120101",
    "120201", "120301", "120401", "120501", "120601", "120701", "120801", "120901", "121001",
    "121101", "121201", "121301", "121401", "121501", "121601", "121701", "160101", "160102",
    "160103", "160104", "160201", "171001", "171002", "220101",
];
