//! Craigslist site codes the scraper may be pointed at.

use crate::SourceError;

/// Craigslist service categories searched in every selected city.
pub const CATEGORIES: &[&str] = &["hss", "sks", "lbs", "fgs", "trd", "aos"];

pub const US_CITIES: &[&str] = &[
    "auburn", "bham", "dothan", "shoals", "gadsden", "huntsville", "mobile", "montgomery",
    "tuscaloosa", "anchorage", "fairbanks", "kenai", "juneau", "flagstaff", "mohave", "phoenix",
    "prescott", "showlow", "sierravista", "tucson", "yuma", "fayar", "fortsmith", "jonesboro",
    "littlerock", "texarkana", "bakersfield", "chico", "fresno", "goldcountry", "hanford",
    "humboldt", "imperial", "inlandempire", "losangeles", "mendocino", "merced", "modesto",
    "monterey", "orangecounty", "palmsprings", "redding", "sacramento", "sandiego", "sfbay",
    "slo", "santabarbara", "santamaria", "stockton", "susanville", "ventura", "visalia",
    "yubasutter", "boulder", "coloradosprings", "denver", "eastco", "fortcollins", "rockies",
    "pueblo", "westslope", "newlondon", "hartford", "newhaven", "delaware", "daytona",
    "fortlauderdale", "fortmyers", "gainesville", "heartland", "jacksonville", "keys",
    "lakeland", "miami", "ocala", "orlando", "panamacity", "pensacola", "sarasota",
    "spacecoast", "staugustine", "tallahassee", "tampa", "treasurecoast", "albanyga",
    "athensga", "atlanta", "augusta", "brunswick", "columbusga", "macon", "nwga", "savannah",
    "statesboro", "valdosta", "warnerrobins", "honolulu", "boise", "eastidaho", "lewiston",
    "twinfalls", "bn", "chambana", "chicago", "decatur", "lasalle", "mattoon", "peoria",
    "rockford", "carbondale", "quincy", "bloomington", "evansville", "fortwayne",
    "indianapolis", "kokomo", "muncie", "richmondin", "southbend", "terrehaute", "ames",
    "cedarrapids", "desmoines", "dubuque", "fortdodge", "iowacity", "masoncity", "quadcities",
    "siouxcity", "waterloo", "lawrence", "ksu", "nwks", "salina", "seks", "swks", "topeka",
    "wichita", "bgky", "eastky", "lexington", "louisville", "owensboro", "westky", "batonrouge",
    "cenla", "houma", "lafayette", "lakecharles", "monroe", "neworleans", "shreveport", "maine",
    "annapolis", "baltimore", "easternshore", "frederick", "smd", "boston", "capecod",
    "southcoast", "worcester", "annarbor", "battlecreek", "centralmich", "detroit", "flint",
    "grandrapids", "holland", "jxn", "kalamazoo", "lansing", "monroemi", "muskegon", "nmi",
    "porthuron", "saginaw", "swmi", "thumb", "bemidji", "brainerd", "duluth", "mankato",
    "minneapolis", "rmn", "stcloud", "gulfport", "hattiesburg", "jackson", "meridian",
    "northmiss", "southmiss", "columbiamo", "joplin", "kansascity", "kirksville", "loz", "semo",
    "springfield", "stjoseph", "stlouis", "billings", "bozeman", "butte", "greatfalls",
    "helena", "kalispell", "missoula", "grandisland", "lincoln", "northplatte", "omaha",
    "scottsbluff", "elko", "lasvegas", "reno", "nh", "cnj", "jerseyshore", "newjersey",
    "southjersey", "albuquerque", "clovis", "farmington", "lascruces", "roswell", "santafe",
    "albany", "binghamton", "buffalo", "catskills", "chautauqua", "elmira", "fingerlakes",
    "glensfalls", "hudsonvalley", "ithaca", "longisland", "newyork", "oneonta", "plattsburgh",
    "potsdam", "rochester", "syracuse", "utica", "watertown", "asheville", "boone", "charlotte",
    "eastnc", "fayetteville", "greensboro", "hickory", "onslow", "outerbanks", "raleigh",
    "wilmington", "winstonsalem", "bismarck", "fargo", "grandforks", "nd", "akroncanton",
    "ashtabula", "athensohio", "chillicothe", "cincinnati", "cleveland", "columbus", "dayton",
    "limaohio", "mansfield", "sandusky", "toledo", "tuscarawas", "youngstown", "zanesville",
    "lawton", "enid", "oklahomacity", "stillwater", "tulsa", "bend", "corvallis", "eastoregon",
    "eugene", "klamath", "medford", "oregoncoast", "portland", "roseburg", "salem", "altoona",
    "chambersburg", "erie", "harrisburg", "lancaster", "allentown", "meadville", "philadelphia",
    "pittsburgh", "poconos", "reading", "scranton", "pennstate", "williamsport", "york",
    "providence", "charlestonwv", "martinsburg", "huntington", "parkersburg", "charleston",
    "columbia", "florencesc", "greenville", "hiltonhead", "myrtlebeach", "nesd", "rapidcity",
    "siouxfalls", "sd", "chattanooga", "clarksville", "cookeville", "knoxville", "memphis",
    "nashville", "tricities",
];

pub fn is_known_city(code: &str) -> bool {
    US_CITIES.contains(&code)
}

/// Reject empty selections and any code outside [`US_CITIES`].
pub fn validate_selection(selection: &[String]) -> Result<(), SourceError> {
    if selection.is_empty() {
        return Err(SourceError::EmptySelection);
    }
    let invalid: Vec<String> = selection
        .iter()
        .filter(|code| !is_known_city(code))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(SourceError::UnknownCities(invalid));
    }
    Ok(())
}

/// One search URL per (city, category).
pub fn search_urls(selection: &[String]) -> Vec<String> {
    selection
        .iter()
        .flat_map(|city| {
            CATEGORIES
                .iter()
                .map(move |category| format!("https://{city}.craigslist.org/search/{category}"))
        })
        .collect()
}
