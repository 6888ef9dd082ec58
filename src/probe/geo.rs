//! Static geography tables used to build probe indexes and the global
//! keyword index.
//!
//! Names are stored in their display form; callers lowercase them.

/// A country row: ISO 3166-1 alpha-2, alpha-3, common name, continent code,
/// UN geoscheme region.
pub struct Country {
    pub code: &'static str,
    pub iso3: &'static str,
    pub name: &'static str,
    pub continent: &'static str,
    pub region: &'static str,
}

const fn c(
    code: &'static str,
    iso3: &'static str,
    name: &'static str,
    continent: &'static str,
    region: &'static str,
) -> Country {
    Country { code, iso3, name, continent, region }
}

pub static COUNTRIES: &[Country] = &[
    c("AD", "AND", "Andorra", "EU", "Southern Europe"),
    c("AE", "ARE", "United Arab Emirates", "AS", "Western Asia"),
    c("AF", "AFG", "Afghanistan", "AS", "Southern Asia"),
    c("AG", "ATG", "Antigua and Barbuda", "NA", "Caribbean"),
    c("AI", "AIA", "Anguilla", "NA", "Caribbean"),
    c("AL", "ALB", "Albania", "EU", "Southern Europe"),
    c("AM", "ARM", "Armenia", "AS", "Western Asia"),
    c("AO", "AGO", "Angola", "AF", "Middle Africa"),
    c("AQ", "ATA", "Antarctica", "AN", "Antarctica"),
    c("AR", "ARG", "Argentina", "SA", "South America"),
    c("AS", "ASM", "American Samoa", "OC", "Polynesia"),
    c("AT", "AUT", "Austria", "EU", "Western Europe"),
    c("AU", "AUS", "Australia", "OC", "Australia and New Zealand"),
    c("AW", "ABW", "Aruba", "NA", "Caribbean"),
    c("AX", "ALA", "Aland Islands", "EU", "Northern Europe"),
    c("AZ", "AZE", "Azerbaijan", "AS", "Western Asia"),
    c("BA", "BIH", "Bosnia and Herzegovina", "EU", "Southern Europe"),
    c("BB", "BRB", "Barbados", "NA", "Caribbean"),
    c("BD", "BGD", "Bangladesh", "AS", "Southern Asia"),
    c("BE", "BEL", "Belgium", "EU", "Western Europe"),
    c("BF", "BFA", "Burkina Faso", "AF", "Western Africa"),
    c("BG", "BGR", "Bulgaria", "EU", "Eastern Europe"),
    c("BH", "BHR", "Bahrain", "AS", "Western Asia"),
    c("BI", "BDI", "Burundi", "AF", "Eastern Africa"),
    c("BJ", "BEN", "Benin", "AF", "Western Africa"),
    c("BL", "BLM", "Saint Barthelemy", "NA", "Caribbean"),
    c("BM", "BMU", "Bermuda", "NA", "Northern America"),
    c("BN", "BRN", "Brunei", "AS", "South-eastern Asia"),
    c("BO", "BOL", "Bolivia", "SA", "South America"),
    c("BQ", "BES", "Bonaire", "NA", "Caribbean"),
    c("BR", "BRA", "Brazil", "SA", "South America"),
    c("BS", "BHS", "Bahamas", "NA", "Caribbean"),
    c("BT", "BTN", "Bhutan", "AS", "Southern Asia"),
    c("BW", "BWA", "Botswana", "AF", "Southern Africa"),
    c("BY", "BLR", "Belarus", "EU", "Eastern Europe"),
    c("BZ", "BLZ", "Belize", "NA", "Central America"),
    c("CA", "CAN", "Canada", "NA", "Northern America"),
    c("CD", "COD", "Democratic Republic of the Congo", "AF", "Middle Africa"),
    c("CF", "CAF", "Central African Republic", "AF", "Middle Africa"),
    c("CG", "COG", "Republic of the Congo", "AF", "Middle Africa"),
    c("CH", "CHE", "Switzerland", "EU", "Western Europe"),
    c("CI", "CIV", "Ivory Coast", "AF", "Western Africa"),
    c("CK", "COK", "Cook Islands", "OC", "Polynesia"),
    c("CL", "CHL", "Chile", "SA", "South America"),
    c("CM", "CMR", "Cameroon", "AF", "Middle Africa"),
    c("CN", "CHN", "China", "AS", "Eastern Asia"),
    c("CO", "COL", "Colombia", "SA", "South America"),
    c("CR", "CRI", "Costa Rica", "NA", "Central America"),
    c("CU", "CUB", "Cuba", "NA", "Caribbean"),
    c("CV", "CPV", "Cape Verde", "AF", "Western Africa"),
    c("CW", "CUW", "Curacao", "NA", "Caribbean"),
    c("CY", "CYP", "Cyprus", "EU", "Western Asia"),
    c("CZ", "CZE", "Czechia", "EU", "Eastern Europe"),
    c("DE", "DEU", "Germany", "EU", "Western Europe"),
    c("DJ", "DJI", "Djibouti", "AF", "Eastern Africa"),
    c("DK", "DNK", "Denmark", "EU", "Northern Europe"),
    c("DM", "DMA", "Dominica", "NA", "Caribbean"),
    c("DO", "DOM", "Dominican Republic", "NA", "Caribbean"),
    c("DZ", "DZA", "Algeria", "AF", "Northern Africa"),
    c("EC", "ECU", "Ecuador", "SA", "South America"),
    c("EE", "EST", "Estonia", "EU", "Northern Europe"),
    c("EG", "EGY", "Egypt", "AF", "Northern Africa"),
    c("ER", "ERI", "Eritrea", "AF", "Eastern Africa"),
    c("ES", "ESP", "Spain", "EU", "Southern Europe"),
    c("ET", "ETH", "Ethiopia", "AF", "Eastern Africa"),
    c("FI", "FIN", "Finland", "EU", "Northern Europe"),
    c("FJ", "FJI", "Fiji", "OC", "Melanesia"),
    c("FM", "FSM", "Micronesia", "OC", "Micronesia"),
    c("FO", "FRO", "Faroe Islands", "EU", "Northern Europe"),
    c("FR", "FRA", "France", "EU", "Western Europe"),
    c("GA", "GAB", "Gabon", "AF", "Middle Africa"),
    c("GB", "GBR", "United Kingdom", "EU", "Northern Europe"),
    c("GD", "GRD", "Grenada", "NA", "Caribbean"),
    c("GE", "GEO", "Georgia", "AS", "Western Asia"),
    c("GF", "GUF", "French Guiana", "SA", "South America"),
    c("GG", "GGY", "Guernsey", "EU", "Northern Europe"),
    c("GH", "GHA", "Ghana", "AF", "Western Africa"),
    c("GI", "GIB", "Gibraltar", "EU", "Southern Europe"),
    c("GL", "GRL", "Greenland", "NA", "Northern America"),
    c("GM", "GMB", "Gambia", "AF", "Western Africa"),
    c("GN", "GIN", "Guinea", "AF", "Western Africa"),
    c("GP", "GLP", "Guadeloupe", "NA", "Caribbean"),
    c("GQ", "GNQ", "Equatorial Guinea", "AF", "Middle Africa"),
    c("GR", "GRC", "Greece", "EU", "Southern Europe"),
    c("GT", "GTM", "Guatemala", "NA", "Central America"),
    c("GU", "GUM", "Guam", "OC", "Micronesia"),
    c("GW", "GNB", "Guinea-Bissau", "AF", "Western Africa"),
    c("GY", "GUY", "Guyana", "SA", "South America"),
    c("HK", "HKG", "Hong Kong", "AS", "Eastern Asia"),
    c("HN", "HND", "Honduras", "NA", "Central America"),
    c("HR", "HRV", "Croatia", "EU", "Southern Europe"),
    c("HT", "HTI", "Haiti", "NA", "Caribbean"),
    c("HU", "HUN", "Hungary", "EU", "Eastern Europe"),
    c("ID", "IDN", "Indonesia", "AS", "South-eastern Asia"),
    c("IE", "IRL", "Ireland", "EU", "Northern Europe"),
    c("IL", "ISR", "Israel", "AS", "Western Asia"),
    c("IM", "IMN", "Isle of Man", "EU", "Northern Europe"),
    c("IN", "IND", "India", "AS", "Southern Asia"),
    c("IQ", "IRQ", "Iraq", "AS", "Western Asia"),
    c("IR", "IRN", "Iran", "AS", "Southern Asia"),
    c("IS", "ISL", "Iceland", "EU", "Northern Europe"),
    c("IT", "ITA", "Italy", "EU", "Southern Europe"),
    c("JE", "JEY", "Jersey", "EU", "Northern Europe"),
    c("JM", "JAM", "Jamaica", "NA", "Caribbean"),
    c("JO", "JOR", "Jordan", "AS", "Western Asia"),
    c("JP", "JPN", "Japan", "AS", "Eastern Asia"),
    c("KE", "KEN", "Kenya", "AF", "Eastern Africa"),
    c("KG", "KGZ", "Kyrgyzstan", "AS", "Central Asia"),
    c("KH", "KHM", "Cambodia", "AS", "South-eastern Asia"),
    c("KI", "KIR", "Kiribati", "OC", "Micronesia"),
    c("KM", "COM", "Comoros", "AF", "Eastern Africa"),
    c("KN", "KNA", "Saint Kitts and Nevis", "NA", "Caribbean"),
    c("KP", "PRK", "North Korea", "AS", "Eastern Asia"),
    c("KR", "KOR", "South Korea", "AS", "Eastern Asia"),
    c("KW", "KWT", "Kuwait", "AS", "Western Asia"),
    c("KY", "CYM", "Cayman Islands", "NA", "Caribbean"),
    c("KZ", "KAZ", "Kazakhstan", "AS", "Central Asia"),
    c("LA", "LAO", "Laos", "AS", "South-eastern Asia"),
    c("LB", "LBN", "Lebanon", "AS", "Western Asia"),
    c("LC", "LCA", "Saint Lucia", "NA", "Caribbean"),
    c("LI", "LIE", "Liechtenstein", "EU", "Western Europe"),
    c("LK", "LKA", "Sri Lanka", "AS", "Southern Asia"),
    c("LR", "LBR", "Liberia", "AF", "Western Africa"),
    c("LS", "LSO", "Lesotho", "AF", "Southern Africa"),
    c("LT", "LTU", "Lithuania", "EU", "Northern Europe"),
    c("LU", "LUX", "Luxembourg", "EU", "Western Europe"),
    c("LV", "LVA", "Latvia", "EU", "Northern Europe"),
    c("LY", "LBY", "Libya", "AF", "Northern Africa"),
    c("MA", "MAR", "Morocco", "AF", "Northern Africa"),
    c("MC", "MCO", "Monaco", "EU", "Western Europe"),
    c("MD", "MDA", "Moldova", "EU", "Eastern Europe"),
    c("ME", "MNE", "Montenegro", "EU", "Southern Europe"),
    c("MF", "MAF", "Saint Martin", "NA", "Caribbean"),
    c("MG", "MDG", "Madagascar", "AF", "Eastern Africa"),
    c("MH", "MHL", "Marshall Islands", "OC", "Micronesia"),
    c("MK", "MKD", "North Macedonia", "EU", "Southern Europe"),
    c("ML", "MLI", "Mali", "AF", "Western Africa"),
    c("MM", "MMR", "Myanmar", "AS", "South-eastern Asia"),
    c("MN", "MNG", "Mongolia", "AS", "Eastern Asia"),
    c("MO", "MAC", "Macao", "AS", "Eastern Asia"),
    c("MP", "MNP", "Northern Mariana Islands", "OC", "Micronesia"),
    c("MQ", "MTQ", "Martinique", "NA", "Caribbean"),
    c("MR", "MRT", "Mauritania", "AF", "Western Africa"),
    c("MS", "MSR", "Montserrat", "NA", "Caribbean"),
    c("MT", "MLT", "Malta", "EU", "Southern Europe"),
    c("MU", "MUS", "Mauritius", "AF", "Eastern Africa"),
    c("MV", "MDV", "Maldives", "AS", "Southern Asia"),
    c("MW", "MWI", "Malawi", "AF", "Eastern Africa"),
    c("MX", "MEX", "Mexico", "NA", "Central America"),
    c("MY", "MYS", "Malaysia", "AS", "South-eastern Asia"),
    c("MZ", "MOZ", "Mozambique", "AF", "Eastern Africa"),
    c("NA", "NAM", "Namibia", "AF", "Southern Africa"),
    c("NC", "NCL", "New Caledonia", "OC", "Melanesia"),
    c("NE", "NER", "Niger", "AF", "Western Africa"),
    c("NG", "NGA", "Nigeria", "AF", "Western Africa"),
    c("NI", "NIC", "Nicaragua", "NA", "Central America"),
    c("NL", "NLD", "Netherlands", "EU", "Western Europe"),
    c("NO", "NOR", "Norway", "EU", "Northern Europe"),
    c("NP", "NPL", "Nepal", "AS", "Southern Asia"),
    c("NR", "NRU", "Nauru", "OC", "Micronesia"),
    c("NZ", "NZL", "New Zealand", "OC", "Australia and New Zealand"),
    c("OM", "OMN", "Oman", "AS", "Western Asia"),
    c("PA", "PAN", "Panama", "NA", "Central America"),
    c("PE", "PER", "Peru", "SA", "South America"),
    c("PF", "PYF", "French Polynesia", "OC", "Polynesia"),
    c("PG", "PNG", "Papua New Guinea", "OC", "Melanesia"),
    c("PH", "PHL", "Philippines", "AS", "South-eastern Asia"),
    c("PK", "PAK", "Pakistan", "AS", "Southern Asia"),
    c("PL", "POL", "Poland", "EU", "Eastern Europe"),
    c("PM", "SPM", "Saint Pierre and Miquelon", "NA", "Northern America"),
    c("PR", "PRI", "Puerto Rico", "NA", "Caribbean"),
    c("PS", "PSE", "Palestine", "AS", "Western Asia"),
    c("PT", "PRT", "Portugal", "EU", "Southern Europe"),
    c("PW", "PLW", "Palau", "OC", "Micronesia"),
    c("PY", "PRY", "Paraguay", "SA", "South America"),
    c("QA", "QAT", "Qatar", "AS", "Western Asia"),
    c("RE", "REU", "Reunion", "AF", "Eastern Africa"),
    c("RO", "ROU", "Romania", "EU", "Eastern Europe"),
    c("RS", "SRB", "Serbia", "EU", "Southern Europe"),
    c("RU", "RUS", "Russia", "EU", "Eastern Europe"),
    c("RW", "RWA", "Rwanda", "AF", "Eastern Africa"),
    c("SA", "SAU", "Saudi Arabia", "AS", "Western Asia"),
    c("SB", "SLB", "Solomon Islands", "OC", "Melanesia"),
    c("SC", "SYC", "Seychelles", "AF", "Eastern Africa"),
    c("SD", "SDN", "Sudan", "AF", "Northern Africa"),
    c("SE", "SWE", "Sweden", "EU", "Northern Europe"),
    c("SG", "SGP", "Singapore", "AS", "South-eastern Asia"),
    c("SI", "SVN", "Slovenia", "EU", "Southern Europe"),
    c("SK", "SVK", "Slovakia", "EU", "Eastern Europe"),
    c("SL", "SLE", "Sierra Leone", "AF", "Western Africa"),
    c("SM", "SMR", "San Marino", "EU", "Southern Europe"),
    c("SN", "SEN", "Senegal", "AF", "Western Africa"),
    c("SO", "SOM", "Somalia", "AF", "Eastern Africa"),
    c("SR", "SUR", "Suriname", "SA", "South America"),
    c("SS", "SSD", "South Sudan", "AF", "Eastern Africa"),
    c("ST", "STP", "Sao Tome and Principe", "AF", "Middle Africa"),
    c("SV", "SLV", "El Salvador", "NA", "Central America"),
    c("SX", "SXM", "Sint Maarten", "NA", "Caribbean"),
    c("SY", "SYR", "Syria", "AS", "Western Asia"),
    c("SZ", "SWZ", "Eswatini", "AF", "Southern Africa"),
    c("TC", "TCA", "Turks and Caicos Islands", "NA", "Caribbean"),
    c("TD", "TCD", "Chad", "AF", "Middle Africa"),
    c("TG", "TGO", "Togo", "AF", "Western Africa"),
    c("TH", "THA", "Thailand", "AS", "South-eastern Asia"),
    c("TJ", "TJK", "Tajikistan", "AS", "Central Asia"),
    c("TL", "TLS", "Timor-Leste", "OC", "South-eastern Asia"),
    c("TM", "TKM", "Turkmenistan", "AS", "Central Asia"),
    c("TN", "TUN", "Tunisia", "AF", "Northern Africa"),
    c("TO", "TON", "Tonga", "OC", "Polynesia"),
    c("TR", "TUR", "Turkey", "AS", "Western Asia"),
    c("TT", "TTO", "Trinidad and Tobago", "NA", "Caribbean"),
    c("TV", "TUV", "Tuvalu", "OC", "Polynesia"),
    c("TW", "TWN", "Taiwan", "AS", "Eastern Asia"),
    c("TZ", "TZA", "Tanzania", "AF", "Eastern Africa"),
    c("UA", "UKR", "Ukraine", "EU", "Eastern Europe"),
    c("UG", "UGA", "Uganda", "AF", "Eastern Africa"),
    c("US", "USA", "United States", "NA", "Northern America"),
    c("UY", "URY", "Uruguay", "SA", "South America"),
    c("UZ", "UZB", "Uzbekistan", "AS", "Central Asia"),
    c("VA", "VAT", "Vatican City", "EU", "Southern Europe"),
    c("VC", "VCT", "Saint Vincent and the Grenadines", "NA", "Caribbean"),
    c("VE", "VEN", "Venezuela", "SA", "South America"),
    c("VG", "VGB", "British Virgin Islands", "NA", "Caribbean"),
    c("VI", "VIR", "U.S. Virgin Islands", "NA", "Caribbean"),
    c("VN", "VNM", "Vietnam", "AS", "South-eastern Asia"),
    c("VU", "VUT", "Vanuatu", "OC", "Melanesia"),
    c("WS", "WSM", "Samoa", "OC", "Polynesia"),
    c("XK", "XKX", "Kosovo", "EU", "Southern Europe"),
    c("YE", "YEM", "Yemen", "AS", "Western Asia"),
    c("YT", "MYT", "Mayotte", "AF", "Eastern Africa"),
    c("ZA", "ZAF", "South Africa", "AF", "Southern Africa"),
    c("ZM", "ZMB", "Zambia", "AF", "Eastern Africa"),
    c("ZW", "ZWE", "Zimbabwe", "AF", "Eastern Africa"),
];

pub static COUNTRY_ALIASES: &[(&str, &[&str])] = &[
    ("AE", &["uae", "emirates"]),
    ("BA", &["bosnia"]),
    ("CD", &["drc", "dr congo", "congo-kinshasa"]),
    ("CG", &["congo", "congo-brazzaville"]),
    ("CI", &["cote d'ivoire"]),
    ("CZ", &["czech republic"]),
    ("GB", &["uk", "great britain", "britain", "england"]),
    ("KP", &["dprk"]),
    ("KR", &["korea", "republic of korea"]),
    ("MK", &["macedonia"]),
    ("NL", &["holland", "the netherlands"]),
    ("RU", &["russian federation"]),
    ("SZ", &["swaziland"]),
    ("TR", &["turkiye"]),
    ("US", &["usa", "america", "united states of america"]),
    ("VN", &["viet nam"]),
];

/// US states plus DC as (code, name).
pub static US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Continents as (code, name, aliases).
pub static CONTINENTS: &[(&str, &str, &[&str])] = &[
    ("AF", "Africa", &[]),
    ("AN", "Antarctica", &[]),
    ("AS", "Asia", &[]),
    ("EU", "Europe", &[]),
    ("NA", "North America", &["northern america"]),
    ("OC", "Oceania", &["australia and oceania"]),
    ("SA", "South America", &["latin america", "latam"]),
];

/// UN geoscheme regions with their accepted aliases.
pub static REGIONS: &[(&str, &[&str])] = &[
    ("Northern Africa", &["north africa"]),
    ("Eastern Africa", &["east africa"]),
    ("Middle Africa", &["central africa"]),
    ("Southern Africa", &["south africa region"]),
    ("Western Africa", &["west africa"]),
    ("Caribbean", &["caribbean islands"]),
    ("Central America", &[]),
    ("South America", &[]),
    ("Northern America", &["north america"]),
    ("Central Asia", &[]),
    ("Eastern Asia", &["east asia"]),
    ("South-eastern Asia", &["south east asia", "southeast asia"]),
    ("Southern Asia", &["south asia"]),
    ("Western Asia", &["west asia", "middle east"]),
    ("Eastern Europe", &["east europe"]),
    ("Northern Europe", &["north europe"]),
    ("Southern Europe", &["south europe"]),
    ("Western Europe", &["west europe"]),
    ("Australia and New Zealand", &["anz"]),
    ("Melanesia", &[]),
    ("Micronesia", &[]),
    ("Polynesia", &[]),
    ("Antarctica", &[]),
];

/// Normalized network names and their short aliases.
pub static NETWORK_ALIASES: &[(&str, &[&str])] = &[
    ("amazon com inc", &["aws", "amazon"]),
    ("google llc", &["gcp", "google"]),
    ("microsoft corporation", &["azure", "microsoft"]),
    ("digitalocean llc", &["digitalocean", "do"]),
    ("ovh sas", &["ovh", "ovhcloud"]),
    ("hetzner online gmbh", &["hetzner"]),
    ("oracle corporation", &["oci", "oracle"]),
    ("akamai technologies inc", &["akamai", "linode"]),
    ("the constant company llc", &["vultr"]),
    ("cloudflare inc", &["cloudflare"]),
    ("alibaba us technology co ltd", &["alibaba", "aliyun"]),
];

pub fn country(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

pub fn country_aliases(code: &str) -> &'static [&'static str] {
    COUNTRY_ALIASES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

pub fn us_state_name(code: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

pub fn continent(code: &str) -> Option<(&'static str, &'static [&'static str])> {
    CONTINENTS
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name, aliases)| (*name, *aliases))
}

pub fn region_aliases(region: &str) -> &'static [&'static str] {
    REGIONS
        .iter()
        .find(|(r, _)| r.eq_ignore_ascii_case(region))
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

pub fn network_aliases(normalized_network: &str) -> &'static [&'static str] {
    NETWORK_ALIASES
        .iter()
        .find(|(n, _)| *n == normalized_network)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}
