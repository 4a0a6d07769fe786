//! Seeded synthetic encounter records.
//!
//! Produces data in the encounter schema with an exact number of
//! short-horizon readmissions and of unknown (`?`) weights. No generated
//! row is removed by the cleaner other than for its weight: encounter ids
//! are unique, discharge codes avoid the excluded set and genders are
//! always valid.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const AGE_BRACKETS: [&str; 10] = [
    "[0-10)", "[10-20)", "[20-30)", "[30-40)", "[40-50)", "[50-60)", "[60-70)", "[70-80)",
    "[80-90)", "[90-100)",
];
const WEIGHTS: [&str; 5] = ["[0-25)", "[25-50)", "[50-75)", "[75-100)", "[100-125)"];
const RACES: [&str; 5] = ["Caucasian", "AfricanAmerican", "Hispanic", "Asian", "Other"];
const GENDERS: [&str; 2] = ["Male", "Female"];
const PAYERS: [&str; 6] = ["MC", "MD", "HM", "SP", "BC", "?"];
const SPECIALTIES: [&str; 5] = [
    "InternalMedicine",
    "Cardiology",
    "Surgery",
    "Emergency/Trauma",
    "?",
];
const DIAGNOSES: [&str; 6] = ["250.01", "250.02", "250.03", "428.0", "414.01", "?"];
const GLUCOSE: [&str; 4] = ["None", "Norm", ">200", ">300"];
const A1C: [&str; 4] = ["None", "Norm", ">7", ">8"];
const DOSAGE: [&str; 4] = ["No", "Steady", "Up", "Down"];
const DISCHARGE_CODES: [i64; 23] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 15, 16, 17, 18, 22, 23, 24, 25, 26, 27, 28, 29,
];

/// Builder for a synthetic encounter table.
#[derive(Debug, Clone)]
pub struct SyntheticEncounters {
    rows: usize,
    readmission_rate: f64,
    weight_missing_rate: f64,
    seed: u64,
}

impl SyntheticEncounters {
    /// `rows` encounters with 10% short-horizon readmissions and 5% unknown
    /// weights.
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            readmission_rate: 0.10,
            weight_missing_rate: 0.05,
            seed: 42,
        }
    }

    pub fn readmission_rate(mut self, rate: f64) -> Self {
        self.readmission_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn weight_missing_rate(mut self, rate: f64) -> Self {
        self.weight_missing_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rows whose outcome is the short-horizon value.
    pub fn short_horizon_rows(&self) -> usize {
        (self.rows as f64 * self.readmission_rate).round() as usize
    }

    /// Rows whose weight is the `?` sentinel.
    pub fn missing_weight_rows(&self) -> usize {
        (self.rows as f64 * self.weight_missing_rate).round() as usize
    }

    /// `count` true flags among `rows`, in random order.
    fn exact_flags(&self, count: usize, rng: &mut StdRng) -> Vec<bool> {
        let mut flags: Vec<bool> = (0..self.rows).map(|i| i < count).collect();
        flags.shuffle(rng);
        flags
    }

    pub fn generate(&self) -> PolarsResult<DataFrame> {
        let n = self.rows;
        let mut rng = StdRng::seed_from_u64(self.seed);

        fn pick<'a>(rng: &mut StdRng, values: &[&'a str], n: usize) -> Vec<&'a str> {
            (0..n).map(|_| values[rng.gen_range(0..values.len())]).collect()
        }
        fn ints(rng: &mut StdRng, low: i64, high: i64, n: usize) -> Vec<i64> {
            (0..n).map(|_| rng.gen_range(low..high)).collect()
        }

        let short = self.exact_flags(self.short_horizon_rows(), &mut rng);
        let readmitted: Vec<&str> = short
            .iter()
            .map(|s| match (*s, rng.gen_bool(7.0 / 9.0)) {
                (true, _) => "<30",
                (false, true) => "NO",
                (false, false) => ">30",
            })
            .collect();

        let unknown_weight = self.exact_flags(self.missing_weight_rows(), &mut rng);
        let weight: Vec<&str> = unknown_weight
            .iter()
            .map(|unknown| {
                if *unknown {
                    "?"
                } else {
                    WEIGHTS[rng.gen_range(0..WEIGHTS.len())]
                }
            })
            .collect();

        let discharge: Vec<i64> = (0..n)
            .map(|_| DISCHARGE_CODES[rng.gen_range(0..DISCHARGE_CODES.len())])
            .collect();

        df!(
            "encounter_id" => (1..=n as i64).collect::<Vec<_>>(),
            "patient_nbr" => ints(&mut rng, 1, 50_000, n),
            "race" => pick(&mut rng, &RACES, n),
            "gender" => pick(&mut rng, &GENDERS, n),
            "age" => pick(&mut rng, &AGE_BRACKETS, n),
            "weight" => weight,
            "admission_type_id" => ints(&mut rng, 1, 9, n),
            "discharge_disposition_id" => discharge,
            "admission_source_id" => ints(&mut rng, 1, 26, n),
            "time_in_hospital" => ints(&mut rng, 1, 15, n),
            "payer_code" => pick(&mut rng, &PAYERS, n),
            "medical_specialty" => pick(&mut rng, &SPECIALTIES, n),
            "diag_1" => pick(&mut rng, &DIAGNOSES, n),
            "diag_2" => pick(&mut rng, &DIAGNOSES, n),
            "diag_3" => pick(&mut rng, &DIAGNOSES, n),
            "num_lab_procedures" => ints(&mut rng, 0, 100, n),
            "num_procedures" => ints(&mut rng, 0, 10, n),
            "num_medications" => ints(&mut rng, 1, 30, n),
            "number_outpatient" => ints(&mut rng, 0, 20, n),
            "number_emergency" => ints(&mut rng, 0, 10, n),
            "number_inpatient" => ints(&mut rng, 0, 15, n),
            "number_diagnoses" => ints(&mut rng, 1, 16, n),
            "max_glu_serum" => pick(&mut rng, &GLUCOSE, n),
            "A1Cresult" => pick(&mut rng, &A1C, n),
            "metformin" => pick(&mut rng, &DOSAGE, n),
            "insulin" => pick(&mut rng, &DOSAGE, n),
            "glipizide" => pick(&mut rng, &DOSAGE, n),
            "glyburide" => pick(&mut rng, &DOSAGE, n),
            "change" => pick(&mut rng, &["No", "Ch"], n),
            "diabetesMed" => pick(&mut rng, &["Yes", "No"], n),
            "readmitted" => readmitted
        )
    }
}
