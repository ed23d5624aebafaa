// src/extraction/dictionaries.rs
//! Curated lexicons shared by term extraction and the matching policies.
//! All entries are lower case.

/// Word endings typical of disease nomenclature.
pub const DIAGNOSTIC_SUFFIXES: &[&str] = &["itis", "osis", "opathy", "algia", "emia", "trophy"];

/// Phrases contributed as diagnostic terms when they occur in a section.
pub const COMMON_CONDITIONS: &[&str] = &[
    "hypertension",
    "diabetes",
    "depression",
    "anxiety",
    "asthma",
    "copd",
    "pneumonia",
    "bronchitis",
    "heart failure",
    "stroke",
    "myocardial infarction",
    "angina",
    "arrhythmia",
    "chest pain",
    "shortness of breath",
    "fever",
    "headache",
    "nausea",
    "vomiting",
];

/// Conditions accepted by the diagnosis relevance check, on top of
/// `COMMON_CONDITIONS`.
pub const RECOGNIZED_CONDITIONS: &[&str] = &[
    "diabetes mellitus",
    "type 2 diabetes",
    "type 1 diabetes",
    "high blood pressure",
    "coronary artery disease",
    "atrial fibrillation",
    "congestive heart failure",
    "chronic kidney disease",
    "osteoarthritis",
    "rheumatoid arthritis",
    "gastroesophageal reflux",
    "gerd",
    "chronic obstructive pulmonary disease",
    "sleep apnea",
    "obesity",
    "hyperlipidemia",
    "hypercholesterolemia",
    "hypothyroidism",
    "hyperthyroidism",
    "migraine",
    "seizure disorder",
    "epilepsy",
];

/// A short sentence containing one of these is taken whole as a term.
pub const SENTENCE_KEYWORDS: &[&str] = &["pain", "syndrome", "disease", "disorder", "condition"];

pub const PROCEDURE_KEYWORDS: &[&str] = &[
    "examination",
    "exam",
    "assessment",
    "test",
    "screening",
    "biopsy",
    "surgery",
    "procedure",
    "injection",
    "vaccination",
    "x-ray",
    "ct scan",
    "mri",
    "ultrasound",
    "ecg",
    "ekg",
    "blood test",
    "lab work",
    "culture",
    "urinalysis",
    "office visit",
    "consultation",
    "follow-up",
    "follow up",
    "evaluation",
    "management",
    "counseling",
    "guidance",
    "monitoring",
    "check-up",
    "visit",
    "appointment",
    "cardiac enzymes",
    "troponin",
    "chest x-ray",
    "blood work",
    "electrocardiogram",
    "physical exam",
    "physical examination",
    "vital signs",
    "blood pressure check",
    "diabetes management",
    "medication management",
    "preventive care",
    "wellness visit",
    "routine check",
    "annual physical",
    "immunization",
];

/// Visit-level phrases also recognised in plan text.
pub const PROCEDURE_PHRASES: &[&str] = &[
    "office visit",
    "follow-up visit",
    "consultation",
    "evaluation and management",
    "e&m",
    "em visit",
    "annual physical",
    "routine check",
    "wellness visit",
    "medication management",
    "blood pressure check",
    "diabetes management",
    "cholesterol management",
];

/// Ordering/planning patterns. Capture group 1, when present, is the term;
/// otherwise the whole match is.
pub const PROCEDURE_PATTERNS: &[&str] = &[
    r"(?:order|ordered|will order|plan to order)\s+([^.]{5,50})",
    r"(?:ekg|ecg|x-ray|chest x-ray|blood work|lab work|cardiac enzymes|troponin)",
    r"(?:follow up|follow-up|return|visit|appointment|consultation)",
    r"(?:evaluation|assessment|examination|exam|check)",
    r"(?:monitoring|management|counseling|guidance)",
    r"(?:order|ordered|will order|plan to order)\s+([a-zA-Z\s]{3,30})",
    r"(?:recommend|prescribe|start|begin)\s+([a-zA-Z\s]{3,30})",
];

/// Added whenever the plan section has content.
pub const PLAN_DEFAULT_TERMS: &[&str] =
    &["office visit", "evaluation and management", "follow-up visit"];

/// Too unspecific to code on their own as a diagnosis.
pub const DIAGNOSIS_STOPLIST: &[&str] = &[
    "pain",
    "exam",
    "test",
    "visit",
    "follow",
    "up",
    "check",
    "assessment",
    "evaluation",
    "management",
    "consultation",
    "office",
    "appointment",
    "procedure",
    "treatment",
    "therapy",
    "medication",
    "drug",
    "symptoms",
    "condition",
    "disease",
    "disorder",
    "syndrome",
    "history",
    "patient",
    "doctor",
    "physician",
    "nurse",
    "medical",
    "clinical",
    "health",
];

pub const PROCEDURE_STOPLIST: &[&str] = &[
    "exam",
    "test",
    "visit",
    "check",
    "follow",
    "return",
    "assessment",
    "management",
    "procedure",
    "appointment",
];

pub const CONCEPT_STOPLIST: &[&str] = &["pain", "condition", "disease", "disorder", "syndrome"];

/// Visit-level services a procedure term may name.
pub const VALID_PROCEDURE_TERMS: &[&str] = &[
    "office visit",
    "consultation",
    "evaluation and management",
    "follow-up visit",
    "annual physical",
    "wellness visit",
    "routine check",
    "physical examination",
    "blood pressure check",
    "diabetes management",
    "medication management",
    "counseling",
    "preventive care",
    "screening",
    "immunization",
    "vaccination",
];

/// Keywords naming a concrete procedure.
pub const SPECIFIC_PROCEDURES: &[&str] = &[
    "blood test",
    "lab work",
    "x-ray",
    "ct scan",
    "mri",
    "ultrasound",
    "ecg",
    "ekg",
    "electrocardiogram",
    "biopsy",
    "injection",
    "vaccination",
    "immunization",
    "surgery",
    "procedure",
    "endoscopy",
    "colonoscopy",
    "mammogram",
    "pap smear",
];

/// Raw procedure terms containing one of these trigger the generic
/// office-visit fallback.
pub const VISIT_FALLBACK_MARKERS: &[&str] =
    &["office visit", "follow up", "consultation", "evaluation"];
pub const VISIT_FALLBACK_TERM: &str = "office visit";

pub const MEDICAL_INDICATORS: &[&str] = &[
    "hypertension",
    "diabetes",
    "chest",
    "heart",
    "blood",
    "pressure",
    "medication",
    "drug",
    "treatment",
    "therapy",
    "diagnosis",
];

pub fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

pub fn has_diagnostic_suffix(word: &str) -> bool {
    DIAGNOSTIC_SUFFIXES
        .iter()
        .any(|suffix| word.len() > suffix.len() && word.ends_with(suffix))
}
