//! Run orchestration
//!
//! Resolves the configured model and distance policy, runs the chosen method
//! on a dedicated rayon pool and assembles [`MsaResults`]. Only the distance
//! matrix is computed in parallel; tree building and merging stay sequential.

use std::sync::mpsc::Sender;

use super::center_star::CenterStarAligner;
use super::distance::{AlignmentScoreDistance, DistanceMatrix, DistanceMetric, EditDistance};
use super::error::{MsaError, Result};
use super::fasta::SequenceSet;
use super::guide_tree::neighbor_joining;
use super::pairwise::PairwiseAligner;
use super::progressive::ProgressiveAligner;
use super::sp_score::sum_of_pairs;
use super::substitution::{Objective, SubstitutionModel};
use super::types::{
    AlignmentParams, DistancePolicy, MsaMethod, MsaResults, ProgressUpdate, ScoringChoice, Stage,
};

/// Resolve a scoring choice into a model. `custom` is the table loaded for
/// [`ScoringChoice::Custom`].
pub fn model_for(
    choice: &ScoringChoice,
    custom: Option<&SubstitutionModel>,
) -> Result<SubstitutionModel> {
    match choice {
        ScoringChoice::Blosum62 => Ok(SubstitutionModel::blosum62()),
        ScoringChoice::Uniform {
            alphabet,
            match_score,
            mismatch_score,
            gap_score,
            minimize,
        } => SubstitutionModel::uniform(
            alphabet.as_bytes(),
            *match_score,
            *mismatch_score,
            *gap_score,
            if *minimize {
                Objective::Minimize
            } else {
                Objective::Maximize
            },
        ),
        ScoringChoice::Custom { name } => custom.cloned().ok_or_else(|| {
            MsaError::Input(format!("substitution table '{}' is not loaded", name))
        }),
    }
}

fn metric_for<'m>(
    policy: DistancePolicy,
    model: &'m SubstitutionModel,
) -> Box<dyn DistanceMetric + 'm> {
    match policy {
        DistancePolicy::AlignmentScore => {
            Box::new(AlignmentScoreDistance::new(PairwiseAligner::new(model)))
        }
        DistancePolicy::EditDistance => Box::new(EditDistance),
    }
}

fn send(
    tx: &Option<Sender<ProgressUpdate>>,
    stage: Stage,
    completed: usize,
    total: usize,
    message: String,
) {
    if let Some(tx) = tx {
        let _ = tx.send(ProgressUpdate {
            stage,
            completed,
            total,
            message,
        });
    }
}

/// Run the complete alignment
pub fn run_alignment(
    sequences: &SequenceSet,
    model: &SubstitutionModel,
    params: &AlignmentParams,
    progress_tx: Option<Sender<ProgressUpdate>>,
) -> Result<MsaResults> {
    if sequences.is_empty() {
        return Err(MsaError::Input("no sequences to align".to_string()));
    }
    for (name, seq) in sequences.iter() {
        model.validate_sequence(name, seq)?;
    }

    let num_threads = params.thread_count.get_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;

    log::info!(
        "aligning {} sequences (length {}..{}) with {}, {}, {}, {} threads",
        sequences.len(),
        sequences.min_len(),
        sequences.max_len(),
        params.method.description(),
        model.name(),
        params.distance.description(),
        num_threads
    );

    let metric = metric_for(params.distance, model);
    let pairs = sequences.len() * (sequences.len() + 1) / 2;

    let mut results = match params.method {
        MsaMethod::Progressive => {
            send(
                &progress_tx,
                Stage::Distances,
                0,
                pairs,
                format!("Computing {} distances...", pairs),
            );
            let distances = pool.install(|| DistanceMatrix::compute(sequences, metric.as_ref()))?;

            send(&progress_tx, Stage::GuideTree, 0, 1, "Building guide tree...".to_string());
            let tree = neighbor_joining(&distances)?;
            log::info!("guide tree built with {} joins", tree.internal_count());
            let dot = tree.to_dot(&sequences.names);
            let newick = tree.to_newick(&sequences.names);

            let merges = tree.internal_count();
            send(
                &progress_tx,
                Stage::Merging,
                0,
                merges,
                "Merging profiles...".to_string(),
            );
            let aligner = ProgressiveAligner::new(model);
            let progressive = aligner.align_tree(sequences, tree, |done, total| {
                send(
                    &progress_tx,
                    Stage::Merging,
                    done,
                    total,
                    format!("Merged {} of {} profiles", done, total),
                )
            })?;

            MsaResults {
                params: params.clone(),
                model_name: model.name().to_string(),
                alignment: progressive.to_alignment(sequences),
                sum_of_pairs: 0,
                merge_score: Some(progressive.score),
                center: None,
                guide_tree_dot: Some(dot),
                guide_tree_newick: Some(newick),
            }
        }
        MsaMethod::CenterStar => {
            send(
                &progress_tx,
                Stage::Distances,
                0,
                pairs,
                "Finding center sequence...".to_string(),
            );
            let aligner = CenterStarAligner::new(model);
            let star = pool.install(|| aligner.align(sequences, metric.as_ref()))?;
            MsaResults {
                params: params.clone(),
                model_name: model.name().to_string(),
                alignment: star.alignment,
                sum_of_pairs: 0,
                merge_score: None,
                center: Some(star.center),
                guide_tree_dot: None,
                guide_tree_newick: None,
            }
        }
    };

    send(&progress_tx, Stage::Scoring, 0, 1, "Scoring alignment...".to_string());
    results.sum_of_pairs = sum_of_pairs(&results.alignment.rows, model)?;
    log::info!(
        "alignment complete: {} columns, sum-of-pairs {}",
        results.alignment_length(),
        results.sum_of_pairs
    );
    send(&progress_tx, Stage::Done, 1, 1, "Done".to_string());

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::fasta::parse_fasta;
    use crate::msa::types::ThreadCount;
    use std::sync::mpsc;

    const CYTOCHROMES: &str = "\
>sp|P99999| Cytochrome c [Homo sapiens]
MGDVEKGKKIFIMKCSQCHTVEKGGKHKTGPNLHGLFGRKTGQAPGYSYTAANKNKGIIW
>sp|P00004| Cytochrome c [Equus caballus]
MGDVEKGKKIFVQKCAQCHTVEKGGKHKTGPNLHGLFGRKTGQAPGFTYTDANKNKGITW
>sp|P00044| Cytochrome c iso-1 [Saccharomyces cerevisiae]
MTEFKAGSAKKGATLFKTRCLQCHTVEKGGPHKVGPNLHGIFGRHSGQAEGYSYTDANIKKNVLW
>sp|P84029| Cytochrome c [Drosophila melanogaster]
MGVPAGDVEKGKKLFVQRCAQCHTVEAGGKHKVGPNLHGLIGRKTGQAAGFAYTDANKAKGITW
";

    fn params(method: MsaMethod) -> AlignmentParams {
        AlignmentParams {
            method,
            thread_count: ThreadCount::Fixed(2),
            ..Default::default()
        }
    }

    fn check(results: &MsaResults, input: &SequenceSet) {
        assert_eq!(results.alignment.names, input.names);
        let width = results.alignment_length();
        for (row, seq) in results.alignment.rows.iter().zip(&input.sequences) {
            assert_eq!(row.len(), width);
            let stripped: Vec<u8> = row.bytes().filter(|&c| c != b'-').collect();
            assert_eq!(&stripped, seq);
        }
    }

    #[test]
    fn test_progressive_run_reports_progress() {
        let input = parse_fasta(CYTOCHROMES).unwrap();
        let model = SubstitutionModel::blosum62();
        let (tx, rx) = mpsc::channel();
        let results =
            run_alignment(&input, &model, &params(MsaMethod::Progressive), Some(tx)).unwrap();
        check(&results, &input);
        assert!(results.guide_tree_dot.as_deref().unwrap().contains("Homo sapiens"));
        assert!(results.guide_tree_newick.as_deref().unwrap().ends_with(';'));
        assert_eq!(results.model_name, "BLOSUM62");
        assert_eq!(results.sum_of_pairs, sum_of_pairs(&results.alignment.rows, &model).unwrap());

        let updates: Vec<ProgressUpdate> = rx.try_iter().collect();
        assert_eq!(updates.first().map(|u| u.stage), Some(Stage::Distances));
        assert_eq!(updates.last().map(|u| u.stage), Some(Stage::Done));
        let merges = updates
            .iter()
            .filter(|u| u.stage == Stage::Merging && u.completed > 0)
            .count();
        assert_eq!(merges, 3);
    }

    #[test]
    fn test_center_star_run() {
        let input = parse_fasta(CYTOCHROMES).unwrap();
        let model = SubstitutionModel::blosum62();
        let results = run_alignment(&input, &model, &params(MsaMethod::CenterStar), None).unwrap();
        check(&results, &input);
        assert!(results.center.is_some());
        assert!(results.guide_tree_dot.is_none());
    }

    #[test]
    fn test_results_survive_json() {
        let input = parse_fasta("ABDC\nABCD\n").unwrap();
        let choice = ScoringChoice::unit_costs("ABCD");
        let model = model_for(&choice, None).unwrap();
        let p = AlignmentParams {
            scoring: choice,
            distance: DistancePolicy::EditDistance,
            ..params(MsaMethod::Progressive)
        };
        let results = run_alignment(&input, &model, &p, None).unwrap();
        assert_eq!(results.sum_of_pairs, 2);
        assert_eq!(results.merge_score, Some(2.0));

        let json = serde_json::to_string_pretty(&results).unwrap();
        let back: MsaResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back.alignment, results.alignment);
        assert_eq!(back.params, p);
    }

    #[test]
    fn test_custom_model_must_be_loaded() {
        let choice = ScoringChoice::Custom {
            name: "pam250".to_string(),
        };
        assert!(matches!(model_for(&choice, None), Err(MsaError::Input(_))));
        let loaded = SubstitutionModel::blosum62();
        assert_eq!(model_for(&choice, Some(&loaded)).unwrap().name(), "BLOSUM62");
    }

    #[test]
    fn test_invalid_residue_fails_whole_run() {
        let input = parse_fasta(">a\nMKV\n>b\nMK1\n").unwrap();
        let model = SubstitutionModel::blosum62();
        let err = run_alignment(&input, &model, &params(MsaMethod::Progressive), None);
        assert!(matches!(err, Err(MsaError::Input(_))));
    }
}
