/// bbmri category for any SNOMED code without a mapping.
pub const BBMRI_FALLBACK: &str = "derivative-other";

/// SNOMED code "Specimen", used for unknown or missing bbmri types.
pub const SNOMED_FALLBACK: &str = "123038009";

pub const BBMRI_SAMPLE_TYPES: &[&str] = &[
    "whole-blood",
    "bone-marrow",
    "buffy-coat",
    "dried-whole-blood",
    "peripheral-blood-cells-vital",
    "blood-plasma",
    "plasma-edta",
    "plasma-citrat",
    "plasma-heparin",
    "plasma-cell-free",
    "plasma-other",
    "blood-serum",
    "ascites",
    "csf-liquor",
    "saliva",
    "stool-faeces",
    "urine",
    "swab",
    "liquid-other",
    "tissue-ffpe",
    "tumor-tissue-ffpe",
    "normal-tissue-ffpe",
    "other-tissue-ffpe",
    "tissue-frozen",
    "tumor-tissue-frozen",
    "normal-tissue-frozen",
    "other-tissue-frozen",
    "tissue-other",
    "dna",
    "cf-dna",
    "g-dna",
    "rna",
    "derivative-other",
];

pub fn from_mii_to_bbmri(snomed: &str) -> &'static str {
    match snomed.trim() {
        "119297000" | "122558009" | "256912003" => "whole-blood",
        "119359002" | "396997002" | "396998007" | "396999004" | "110897001" | "167913002" => {
            "bone-marrow"
        }
        "258587000" | "117171008" => "buffy-coat",
        "119294007" | "440500007" | "738796001" => "dried-whole-blood",
        "404798000" | "122551003" => "peripheral-blood-cells-vital",
        "119361006" | "708049000" | "708048008" | "258958007" | "446272009" | "2431000181102"
        | "2441000181109" | "898205005" => "blood-plasma",
        "119364003" | "122591000" => "blood-serum",
        "258441009" | "442039000" => "ascites",
        "258450006" => "csf-liquor",
        "119342007" => "saliva",
        "119339001" => "stool-faeces",
        "122575003" => "urine",
        "257261003" => "swab",
        "441652008" => "tissue-ffpe",
        "16214131000119104" | "1003517007" => "tissue-frozen",
        "119376003" => "tissue-other",
        "258566005" | "726740008" | "18470003" => "dna",
        "441673008" => "rna",
        "33463005" => "liquid-other",
        _ => BBMRI_FALLBACK,
    }
}

pub fn from_bbmri_to_mii(bbmri: Option<&str>) -> &'static str {
    let Some(bbmri) = bbmri else {
        return SNOMED_FALLBACK;
    };
    match bbmri.trim() {
        "whole-blood" => "119297000",
        "bone-marrow" => "119359002",
        "buffy-coat" => "258587000",
        "dried-whole-blood" => "119294007",
        "peripheral-blood-cells-vital" => "404798000",
        "blood-plasma" | "plasma-cell-free" | "plasma-other" => "119361006",
        "plasma-edta" => "708049000",
        "plasma-citrat" => "708048008",
        "plasma-heparin" => "446272009",
        "blood-serum" => "119364003",
        "ascites" => "258441009",
        "csf-liquor" => "258450006",
        "saliva" => "119342007",
        "stool-faeces" => "119339001",
        "urine" => "122575003",
        "swab" => "257261003",
        "tissue-ffpe" | "tumor-tissue-ffpe" | "normal-tissue-ffpe" | "other-tissue-ffpe" => {
            "441652008"
        }
        "tissue-frozen" | "tumor-tissue-frozen" | "normal-tissue-frozen"
        | "other-tissue-frozen" => "16214131000119104",
        "tissue-other" => "119376003",
        "dna" => "258566005",
        "cf-dna" => "726740008",
        "g-dna" => "18470003",
        "rna" => "441673008",
        "liquid-other" => "33463005",
        _ => SNOMED_FALLBACK,
    }
}
