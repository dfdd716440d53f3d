//! Main application state and UI

use eframe::egui;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver};
use std::thread;

use progressive_msa::{
    model_for, parse_fasta, run_alignment, AlignmentParams, DistancePolicy, MsaMethod,
    MsaResults, MultipleAlignment, ProgressUpdate, ScoringChoice, SequenceSet, SubstitutionModel,
    ThreadCount, GAP,
};

/// Application state
pub struct MsaApp {
    // Input tab state - sequences
    sequence_input: String,
    sequences: Option<SequenceSet>,
    sequence_error: Option<String>,

    // Input tab state - custom substitution table
    custom_model: Option<SubstitutionModel>,
    model_error: Option<String>,

    // Alignment parameters
    params: AlignmentParams,
    scoring_selection: ScoringSelection,
    uniform_alphabet: String,
    uniform_match: i32,
    uniform_mismatch: i32,
    uniform_gap: i32,
    uniform_minimize: bool,
    thread_selection: ThreadSelection,
    manual_thread_count: usize,

    // Alignment state
    is_aligning: bool,
    alignment_progress: Option<ProgressUpdate>,
    progress_rx: Option<Receiver<ProgressUpdate>>,
    results_rx: Option<Receiver<Result<MsaResults, String>>>,
    run_error: Option<String>,

    // Results state
    results: Option<MsaResults>,
    output_format: OutputFormat,
    show_tree_window: bool,

    // View state
    current_tab: Tab,
    zoom_level: f32,

    // Save/Load
    save_error: Option<String>,
    load_error: Option<String>,

    // Deferred actions
    pending_export: Option<Export>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Input,
    Setup,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoringSelection {
    Blosum62,
    Uniform,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadSelection {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Labeled,
    Plain,
    Fasta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Export {
    Results,
    Alignment,
    TreeDot,
    TreeNewick,
}

impl Default for MsaApp {
    fn default() -> Self {
        let available_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            sequence_input: String::new(),
            sequences: None,
            sequence_error: None,
            custom_model: None,
            model_error: None,
            params: AlignmentParams::default(),
            scoring_selection: ScoringSelection::Blosum62,
            uniform_alphabet: "ACGT".to_string(),
            uniform_match: 0,
            uniform_mismatch: 3,
            uniform_gap: 1,
            uniform_minimize: true,
            thread_selection: ThreadSelection::Auto,
            manual_thread_count: available_threads,
            is_aligning: false,
            alignment_progress: None,
            progress_rx: None,
            results_rx: None,
            run_error: None,
            results: None,
            output_format: OutputFormat::Labeled,
            show_tree_window: false,
            current_tab: Tab::Input,
            zoom_level: 1.0,
            save_error: None,
            load_error: None,
            pending_export: None,
        }
    }
}

impl MsaApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self::default()
    }

    fn parse_sequence_input(&mut self) {
        self.sequence_error = None;
        self.sequences = None;

        if self.sequence_input.trim().is_empty() {
            return;
        }

        match parse_fasta(&self.sequence_input) {
            Ok(set) => {
                self.sequences = Some(set);
            }
            Err(e) => {
                self.sequence_error = Some(e.to_string());
            }
        }
    }

    fn scoring_choice(&self) -> ScoringChoice {
        match self.scoring_selection {
            ScoringSelection::Blosum62 => ScoringChoice::Blosum62,
            ScoringSelection::Uniform => ScoringChoice::Uniform {
                alphabet: self.uniform_alphabet.trim().to_string(),
                match_score: self.uniform_match,
                mismatch_score: self.uniform_mismatch,
                gap_score: self.uniform_gap,
                minimize: self.uniform_minimize,
            },
            ScoringSelection::Custom => ScoringChoice::Custom {
                name: self
                    .custom_model
                    .as_ref()
                    .map(|m| m.name().to_string())
                    .unwrap_or_default(),
            },
        }
    }

    fn start_alignment(&mut self) {
        let Some(sequences) = &self.sequences else {
            return;
        };

        self.params.scoring = self.scoring_choice();
        self.params.thread_count = match self.thread_selection {
            ThreadSelection::Auto => ThreadCount::Auto,
            ThreadSelection::Manual => ThreadCount::Fixed(self.manual_thread_count),
        };

        let model = match model_for(&self.params.scoring, self.custom_model.as_ref()) {
            Ok(model) => model,
            Err(e) => {
                log::warn!("cannot start alignment: {}", e);
                self.run_error = Some(e.to_string());
                return;
            }
        };

        let sequences_clone = sequences.clone();
        let params_clone = self.params.clone();

        let (progress_tx, progress_rx) = channel();
        let (results_tx, results_rx) = channel();

        self.progress_rx = Some(progress_rx);
        self.results_rx = Some(results_rx);
        self.is_aligning = true;
        self.alignment_progress = None;
        self.run_error = None;

        thread::spawn(move || {
            let results = run_alignment(&sequences_clone, &model, &params_clone, Some(progress_tx))
                .map_err(|e| e.to_string());
            let _ = results_tx.send(results);
        });
    }

    fn check_alignment_progress(&mut self) {
        if let Some(rx) = &self.progress_rx {
            while let Ok(progress) = rx.try_recv() {
                self.alignment_progress = Some(progress);
            }
        }

        if let Some(rx) = &self.results_rx {
            if let Ok(outcome) = rx.try_recv() {
                match outcome {
                    Ok(results) => {
                        self.results = Some(results);
                        self.current_tab = Tab::Results;
                    }
                    Err(e) => {
                        log::warn!("alignment failed: {}", e);
                        self.run_error = Some(e);
                    }
                }
                self.is_aligning = false;
                self.progress_rx = None;
                self.results_rx = None;
            }
        }
    }

    fn export(&mut self, export: Export) {
        let Some(results) = &self.results else {
            self.save_error = Some("No results to save".to_string());
            return;
        };

        let (filter, extensions, file_name, content) = match export {
            Export::Results => match serde_json::to_string_pretty(results) {
                Ok(json) => ("JSON", &["json"][..], "msa_results.json", json),
                Err(e) => {
                    self.save_error = Some(format!("Failed to serialize: {}", e));
                    return;
                }
            },
            Export::Alignment => match self.output_format {
                OutputFormat::Labeled => (
                    "Text",
                    &["txt"][..],
                    "alignment.txt",
                    results.alignment.to_labeled_text(),
                ),
                OutputFormat::Plain => (
                    "Text",
                    &["txt"][..],
                    "alignment.txt",
                    results.alignment.to_plain_text(),
                ),
                OutputFormat::Fasta => (
                    "FASTA",
                    &["fasta", "fa", "aln"][..],
                    "alignment.fasta",
                    results.alignment.to_fasta(),
                ),
            },
            Export::TreeDot => match &results.guide_tree_dot {
                Some(dot) => ("Graphviz", &["dot", "gv"][..], "guide_tree.dot", dot.clone()),
                None => {
                    self.save_error = Some("This run has no guide tree".to_string());
                    return;
                }
            },
            Export::TreeNewick => match &results.guide_tree_newick {
                Some(nwk) => (
                    "Newick",
                    &["nwk", "newick", "tree"][..],
                    "guide_tree.nwk",
                    nwk.clone(),
                ),
                None => {
                    self.save_error = Some("This run has no guide tree".to_string());
                    return;
                }
            },
        };

        if let Some(path) = rfd::FileDialog::new()
            .add_filter(filter, extensions)
            .set_file_name(file_name)
            .save_file()
        {
            if let Err(e) = std::fs::write(&path, content) {
                log::warn!("failed to write {}: {}", path.display(), e);
                self.save_error = Some(format!("Failed to write file: {}", e));
            } else {
                self.save_error = None;
            }
        }
    }

    fn load_results(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        {
            match std::fs::read_to_string(&path) {
                Ok(json) => match serde_json::from_str::<MsaResults>(&json) {
                    Ok(results) => {
                        self.results = Some(results);
                        self.load_error = None;
                        self.current_tab = Tab::Results;
                    }
                    Err(e) => {
                        self.load_error = Some(format!("Failed to parse: {}", e));
                    }
                },
                Err(e) => {
                    self.load_error = Some(format!("Failed to read file: {}", e));
                }
            }
        }
    }

    fn load_sequence_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("FASTA", &["fasta", "fa", "faa", "fas", "txt"])
            .pick_file()
        {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    self.sequence_input = content;
                    self.parse_sequence_input();
                }
                Err(e) => {
                    self.sequence_error = Some(format!("Failed to read file: {}", e));
                }
            }
        }
    }

    fn load_model_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Substitution table", &["txt", "mat", "tsv"])
            .pick_file()
        {
            match SubstitutionModel::from_path(&path) {
                Ok(model) => {
                    self.custom_model = Some(model);
                    self.scoring_selection = ScoringSelection::Custom;
                    self.model_error = None;
                }
                Err(e) => {
                    log::warn!("failed to load {}: {}", path.display(), e);
                    self.model_error = Some(e.to_string());
                }
            }
        }
    }
}

impl eframe::App for MsaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.is_aligning {
            self.check_alignment_progress();
            ctx.request_repaint();
        }

        if let Some(export) = self.pending_export.take() {
            self.export(export);
        }

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Load Sequences...").clicked() {
                        self.load_sequence_file();
                        ui.close_menu();
                    }
                    if ui.button("Load Substitution Table...").clicked() {
                        self.load_model_file();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Load Results...").clicked() {
                        self.load_results();
                        ui.close_menu();
                    }
                    if ui.button("Save Results...").clicked() {
                        self.export(Export::Results);
                        ui.close_menu();
                    }
                });
            });
        });

        // Tab bar
        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.current_tab, Tab::Input, "Input Data");
                ui.selectable_value(&mut self.current_tab, Tab::Setup, "Alignment Setup");
                ui.selectable_value(&mut self.current_tab, Tab::Results, "Results");
            });
        });

        // Status bar
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.is_aligning {
                    ui.spinner();
                    if let Some(ref progress) = self.alignment_progress {
                        ui.label(&progress.message);
                        if progress.total > 1 {
                            ui.add(
                                egui::ProgressBar::new(progress.fraction())
                                    .desired_width(200.0)
                                    .show_percentage(),
                            );
                        }
                    } else {
                        ui.label("Starting alignment...");
                    }
                } else if let Some(ref results) = self.results {
                    ui.label(format!(
                        "Results: {} sequences, {} columns, SP score {}",
                        results.total_sequences(),
                        results.alignment_length(),
                        results.sum_of_pairs
                    ));
                } else if let Some(ref set) = self.sequences {
                    ui.label(format!(
                        "{} sequences ({}-{} residues)",
                        set.len(),
                        set.min_len(),
                        set.max_len()
                    ));
                } else {
                    ui.label("Load sequences to begin");
                }
            });
        });

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| match self.current_tab {
            Tab::Input => self.show_input_tab(ui),
            Tab::Setup => self.show_setup_tab(ui),
            Tab::Results => self.show_results_tab(ui),
        });

        if self.show_tree_window {
            self.show_guide_tree_window(ctx);
        }
    }
}

impl MsaApp {
    fn show_input_tab(&mut self, ui: &mut egui::Ui) {
        ui.heading("Input Data");
        ui.separator();

        let panel_height = (ui.available_height() - 220.0).max(160.0);

        // --- Sequences ---
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.heading("Sequences");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Clear").clicked() {
                        self.sequence_input.clear();
                        self.sequences = None;
                        self.sequence_error = None;
                    }
                    if ui.button("Load File").clicked() {
                        self.load_sequence_file();
                    }
                    if ui.button("Load Example").clicked() {
                        self.sequence_input = EXAMPLE_SEQUENCES.to_string();
                        self.parse_sequence_input();
                    }
                });
            });

            ui.label("Unaligned sequences in FASTA format, or one sequence per line:");

            egui::ScrollArea::vertical()
                .id_salt("sequence_scroll")
                .max_height(panel_height)
                .show(ui, |ui| {
                    let response = ui.add(
                        egui::TextEdit::multiline(&mut self.sequence_input)
                            .font(egui::TextStyle::Monospace)
                            .desired_width(f32::INFINITY)
                            .desired_rows(10),
                    );
                    if response.changed() {
                        self.parse_sequence_input();
                    }
                });

            if let Some(ref error) = self.sequence_error {
                ui.colored_label(egui::Color32::RED, format!("Error: {}", error));
            }
            if let Some(ref set) = self.sequences {
                ui.colored_label(
                    egui::Color32::from_rgb(100, 200, 100),
                    format!(
                        "{} sequences ({}-{} residues)",
                        set.len(),
                        set.min_len(),
                        set.max_len()
                    ),
                );
            }
        });

        ui.add_space(5.0);

        // --- Substitution table ---
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.heading("Substitution Table");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Load Table").clicked() {
                        self.load_model_file();
                    }
                });
            });
            ui.label(
                "Optional. Whitespace-separated square table with a header row of symbols \
                 and a '-' row and column for gaps.",
            );
            if let Some(ref error) = self.model_error {
                ui.colored_label(egui::Color32::RED, format!("Error: {}", error));
            }
            if let Some(ref model) = self.custom_model {
                ui.colored_label(
                    egui::Color32::from_rgb(100, 200, 100),
                    format!("Loaded '{}' ({} residues)", model.name(), model.residue_count()),
                );
            }
        });
    }

    fn show_setup_tab(&mut self, ui: &mut egui::Ui) {
        ui.heading("Alignment Setup");
        ui.separator();

        let has_sequences = self.sequences.is_some();
        if !has_sequences {
            ui.colored_label(
                egui::Color32::YELLOW,
                "Please load sequences in the Input tab.",
            );
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            // Method
            ui.group(|ui| {
                ui.heading("Alignment Method");
                ui.radio_value(
                    &mut self.params.method,
                    MsaMethod::Progressive,
                    "Progressive - Merge profiles along a neighbor-joining guide tree",
                );
                ui.radio_value(
                    &mut self.params.method,
                    MsaMethod::CenterStar,
                    "Center star - Align every sequence to the most central one",
                );
            });

            ui.add_space(10.0);

            // Distance policy
            ui.group(|ui| {
                ui.heading("Distance");
                ui.radio_value(
                    &mut self.params.distance,
                    DistancePolicy::AlignmentScore,
                    "Alignment score - Optimal global score under the substitution table",
                );
                ui.radio_value(
                    &mut self.params.distance,
                    DistancePolicy::EditDistance,
                    "Edit distance - Count of insertions, deletions and substitutions",
                );
            });

            ui.add_space(10.0);

            // Scoring
            ui.group(|ui| {
                ui.heading("Scoring");
                ui.radio_value(
                    &mut self.scoring_selection,
                    ScoringSelection::Blosum62,
                    "BLOSUM62 (gap -4)",
                );
                ui.radio_value(
                    &mut self.scoring_selection,
                    ScoringSelection::Uniform,
                    "Uniform match / mismatch / gap",
                );

                if self.scoring_selection == ScoringSelection::Uniform {
                    ui.horizontal(|ui| {
                        ui.add_space(20.0);
                        ui.label("Alphabet:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.uniform_alphabet)
                                .font(egui::TextStyle::Monospace)
                                .desired_width(200.0),
                        );
                    });
                    ui.horizontal(|ui| {
                        ui.add_space(20.0);
                        ui.label("Match:");
                        ui.add(egui::DragValue::new(&mut self.uniform_match).range(-20..=20));
                        ui.add_space(10.0);
                        ui.label("Mismatch:");
                        ui.add(egui::DragValue::new(&mut self.uniform_mismatch).range(-20..=20));
                        ui.add_space(10.0);
                        ui.label("Gap:");
                        ui.add(egui::DragValue::new(&mut self.uniform_gap).range(-20..=20));
                    });
                    ui.horizontal(|ui| {
                        ui.add_space(20.0);
                        ui.checkbox(
                            &mut self.uniform_minimize,
                            "Scores are costs (minimize)",
                        );
                    });
                }

                let has_custom = self.custom_model.is_some();
                ui.horizontal(|ui| {
                    ui.add_enabled_ui(has_custom, |ui| {
                        ui.radio_value(
                            &mut self.scoring_selection,
                            ScoringSelection::Custom,
                            "Custom table",
                        );
                    });
                    if let Some(ref model) = self.custom_model {
                        ui.label(format!("'{}'", model.name()));
                    } else {
                        ui.label("(load one in the Input tab)");
                    }
                });
            });

            ui.add_space(10.0);

            // Thread count
            ui.group(|ui| {
                ui.heading("Parallelization");

                let available_threads = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);

                ui.horizontal(|ui| {
                    ui.radio_value(
                        &mut self.thread_selection,
                        ThreadSelection::Auto,
                        format!("Auto ({} threads)", available_threads),
                    );
                });

                ui.horizontal(|ui| {
                    ui.radio_value(
                        &mut self.thread_selection,
                        ThreadSelection::Manual,
                        "Manual:",
                    );
                    let enabled = self.thread_selection == ThreadSelection::Manual;
                    ui.add_enabled(
                        enabled,
                        egui::DragValue::new(&mut self.manual_thread_count)
                            .range(1..=available_threads.max(32)),
                    );
                    ui.label("threads");
                });

                ui.label("Threads are used for the pairwise distance matrix only");
            });

            ui.add_space(20.0);

            // Run button
            ui.horizontal(|ui| {
                let can_run = has_sequences && !self.is_aligning;
                if ui
                    .add_enabled(can_run, egui::Button::new("Run Alignment"))
                    .clicked()
                {
                    self.start_alignment();
                }

                if self.is_aligning {
                    ui.spinner();
                    if let Some(ref progress) = self.alignment_progress {
                        ui.label(&progress.message);
                    }
                }
            });

            if let Some(ref error) = self.run_error {
                ui.colored_label(egui::Color32::RED, format!("Error: {}", error));
            }
        });
    }

    fn show_results_tab(&mut self, ui: &mut egui::Ui) {
        let Some(results) = &self.results else {
            ui.heading("Results");
            ui.separator();
            ui.label("No results yet. Run an alignment from the Alignment Setup tab.");
            return;
        };
        let has_tree = results.guide_tree_dot.is_some();

        ui.horizontal(|ui| {
            ui.heading("Results");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Save Results").clicked() {
                    self.pending_export = Some(Export::Results);
                }
                if ui.button("Save Alignment").clicked() {
                    self.pending_export = Some(Export::Alignment);
                }
                if ui
                    .add_enabled(has_tree, egui::Button::new("Guide Tree"))
                    .clicked()
                {
                    self.show_tree_window = true;
                }
            });
        });
        ui.separator();

        egui::Grid::new("results_summary")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("Method:");
                ui.label(results.params.method.description());
                ui.end_row();
                ui.label("Scoring:");
                ui.label(&results.model_name);
                ui.end_row();
                ui.label("Distance:");
                ui.label(results.params.distance.description());
                ui.end_row();
                ui.label("Sequences:");
                ui.label(format!("{}", results.total_sequences()));
                ui.end_row();
                ui.label("Columns:");
                ui.label(format!("{}", results.alignment_length()));
                ui.end_row();
                ui.label("Sum-of-pairs score:");
                ui.label(format!("{}", results.sum_of_pairs));
                ui.end_row();
                if let Some(score) = results.merge_score {
                    ui.label("Root merge score:");
                    ui.label(format!("{:.2}", score));
                    ui.end_row();
                }
                if let Some(center) = results.center {
                    ui.label("Center sequence:");
                    ui.label(
                        results
                            .alignment
                            .names
                            .get(center)
                            .map(String::as_str)
                            .unwrap_or("?"),
                    );
                    ui.end_row();
                }
            });

        ui.add_space(5.0);

        // Controls
        ui.horizontal(|ui| {
            ui.label("Zoom:");
            ui.add(egui::Slider::new(&mut self.zoom_level, 0.5..=3.0));
            ui.add_space(20.0);
            ui.label("Export as:");
            ui.radio_value(&mut self.output_format, OutputFormat::Labeled, "id: aligned");
            ui.radio_value(&mut self.output_format, OutputFormat::Plain, "Plain lines");
            ui.radio_value(&mut self.output_format, OutputFormat::Fasta, "FASTA");
        });

        ui.add_space(5.0);

        show_alignment_view(ui, &results.alignment, self.zoom_level);

        // Error messages
        if let Some(ref error) = self.save_error {
            ui.colored_label(egui::Color32::RED, error);
        }
        if let Some(ref error) = self.load_error {
            ui.colored_label(egui::Color32::RED, error);
        }
    }

    fn show_guide_tree_window(&mut self, ctx: &egui::Context) {
        let Some(ref results) = self.results else {
            self.show_tree_window = false;
            return;
        };
        let (Some(dot), Some(newick)) = (&results.guide_tree_dot, &results.guide_tree_newick)
        else {
            self.show_tree_window = false;
            return;
        };

        let mut export = None;
        egui::Window::new("Guide Tree")
            .open(&mut self.show_tree_window)
            .default_width(600.0)
            .default_height(450.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Newick:");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Save DOT").clicked() {
                            export = Some(Export::TreeDot);
                        }
                        if ui.button("Save Newick").clicked() {
                            export = Some(Export::TreeNewick);
                        }
                    });
                });
                ui.add(
                    egui::Label::new(egui::RichText::new(newick).monospace().size(11.0))
                        .wrap_mode(egui::TextWrapMode::Wrap),
                );
                ui.separator();
                ui.label("Graphviz:");
                egui::ScrollArea::vertical()
                    .id_salt("dot_scroll")
                    .show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut dot.as_str())
                                .font(egui::TextStyle::Monospace)
                                .desired_width(f32::INFINITY),
                        );
                    });
            });

        if export.is_some() {
            self.pending_export = export;
        }
    }
}

/// Colored residue grid with a ruler on top and a conservation row below.
fn show_alignment_view(ui: &mut egui::Ui, alignment: &MultipleAlignment, zoom: f32) {
    let num_cols = alignment.column_count();
    let num_rows = alignment.sequence_count();
    if num_cols == 0 {
        ui.label("Empty alignment.");
        return;
    }

    let cell_w = (11.0 * zoom).max(4.0);
    let cell_h = (16.0 * zoom).max(8.0);
    let label_width = 160.0;
    let ruler_height = 16.0 * zoom;
    let conservation = column_conservation(alignment);

    let total_width = label_width + num_cols as f32 * cell_w;
    let total_height = ruler_height + (num_rows as f32 + 1.0) * cell_h + 10.0;

    egui::ScrollArea::both()
        .id_salt("alignment_scroll")
        .show(ui, |ui| {
            let (response, painter) = ui.allocate_painter(
                egui::vec2(total_width, total_height),
                egui::Sense::hover(),
            );
            let origin = response.rect.min;
            let grid_x = origin.x + label_width;
            let grid_y = origin.y + ruler_height;

            // Only columns inside the visible area are painted
            let clip = painter.clip_rect();
            let first_col = ((clip.min.x - grid_x) / cell_w).floor().max(0.0) as usize;
            let last_col = ((clip.max.x - grid_x) / cell_w).ceil().max(0.0) as usize;
            let (first_col, last_col) = (first_col.min(num_cols), last_col.min(num_cols));

            // --- Ruler ---
            for col in first_col..last_col {
                if (col + 1) % 10 != 0 {
                    continue;
                }
                let x = grid_x + col as f32 * cell_w + cell_w / 2.0;
                painter.text(
                    egui::pos2(x, origin.y + ruler_height / 2.0),
                    egui::Align2::CENTER_CENTER,
                    format!("{}", col + 1),
                    egui::FontId::proportional(9.0 * zoom.min(1.5)),
                    egui::Color32::GRAY,
                );
            }

            let font = egui::FontId::monospace(10.0 * zoom.min(1.5));
            let show_letters = cell_w >= 7.0;

            // --- Rows ---
            for (row_idx, (name, row)) in alignment.names.iter().zip(&alignment.rows).enumerate() {
                let y = grid_y + row_idx as f32 * cell_h;
                painter.text(
                    egui::pos2(clip.min.x.max(origin.x) + 4.0, y + cell_h / 2.0),
                    egui::Align2::LEFT_CENTER,
                    truncate_label(name, 20),
                    egui::FontId::proportional(11.0 * zoom.min(1.3)),
                    egui::Color32::LIGHT_GRAY,
                );

                let bytes = row.as_bytes();
                for col in first_col..last_col.min(bytes.len()) {
                    let symbol = bytes[col];
                    let cell_rect = egui::Rect::from_min_size(
                        egui::pos2(grid_x + col as f32 * cell_w, y),
                        egui::vec2(cell_w - 1.0, cell_h - 1.0),
                    );
                    painter.rect_filled(cell_rect, 1.0, residue_color(symbol));
                    if show_letters && symbol != GAP {
                        painter.text(
                            cell_rect.center(),
                            egui::Align2::CENTER_CENTER,
                            (symbol as char).to_string(),
                            font.clone(),
                            egui::Color32::BLACK,
                        );
                    }
                }
            }

            // --- Conservation ---
            let y = grid_y + num_rows as f32 * cell_h + 4.0;
            painter.text(
                egui::pos2(clip.min.x.max(origin.x) + 4.0, y + cell_h / 2.0),
                egui::Align2::LEFT_CENTER,
                "Conservation",
                egui::FontId::proportional(11.0 * zoom.min(1.3)),
                egui::Color32::GRAY,
            );
            for col in first_col..last_col {
                let height = conservation[col] as f32 * (cell_h - 2.0);
                let bar = egui::Rect::from_min_max(
                    egui::pos2(grid_x + col as f32 * cell_w, y + cell_h - height),
                    egui::pos2(grid_x + (col + 1) as f32 * cell_w - 1.0, y + cell_h),
                );
                painter.rect_filled(bar, 0.0, egui::Color32::from_rgb(100, 150, 255));
            }

            // --- Hover ---
            if let Some(pos) = response.hover_pos() {
                let col = ((pos.x - grid_x) / cell_w).floor();
                let row = ((pos.y - grid_y) / cell_h).floor();
                let inside = col >= 0.0 && row >= 0.0;
                if inside && (col as usize) < num_cols && (row as usize) < num_rows {
                    let (col, row) = (col as usize, row as usize);
                    let bytes = alignment.rows[row].as_bytes();
                    let cell_rect = egui::Rect::from_min_size(
                        egui::pos2(grid_x + col as f32 * cell_w, grid_y + row as f32 * cell_h),
                        egui::vec2(cell_w - 1.0, cell_h - 1.0),
                    );
                    painter.rect_stroke(
                        cell_rect,
                        1.0,
                        egui::Stroke::new(2.0, egui::Color32::WHITE),
                        egui::StrokeKind::Outside,
                    );

                    let symbol = bytes.get(col).copied().unwrap_or(GAP);
                    let residue_pos = bytes.iter().take(col + 1).filter(|&&c| c != GAP).count();
                    let tooltip_text = if symbol == GAP {
                        format!("{}\nColumn {}: gap", alignment.names[row], col + 1)
                    } else {
                        format!(
                            "{}\nColumn {}: {} (residue {})\nConservation {:.0}%",
                            alignment.names[row],
                            col + 1,
                            symbol as char,
                            residue_pos,
                            conservation[col] * 100.0
                        )
                    };
                    response.clone().on_hover_text(tooltip_text);
                }
            }
        });
}

/// Fraction of rows carrying the most common residue of each column.
fn column_conservation(alignment: &MultipleAlignment) -> Vec<f64> {
    let rows = alignment.sequence_count().max(1) as f64;
    (0..alignment.column_count())
        .map(|col| {
            let mut counts = [0usize; 256];
            for row in &alignment.rows {
                if let Some(&c) = row.as_bytes().get(col) {
                    if c != GAP {
                        counts[c as usize] += 1;
                    }
                }
            }
            counts.iter().copied().max().unwrap_or(0) as f64 / rows
        })
        .collect()
}

fn truncate_label(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(max_chars - 1).collect();
        short.push('…');
        short
    }
}

/// Residue background colors, grouped by physico-chemical class
static RESIDUE_COLORS: Lazy<HashMap<u8, egui::Color32>> = Lazy::new(|| {
    let mut map = HashMap::new();
    let groups: [(&[u8], egui::Color32); 8] = [
        (&b"AILMFWV"[..], egui::Color32::from_rgb(128, 160, 240)), // Hydrophobic
        (&b"KR"[..], egui::Color32::from_rgb(240, 80, 60)),        // Positive
        (&b"ED"[..], egui::Color32::from_rgb(192, 72, 192)),       // Negative
        (&b"NQST"[..], egui::Color32::from_rgb(60, 200, 80)),      // Polar
        (&b"C"[..], egui::Color32::from_rgb(240, 128, 128)),
        (&b"G"[..], egui::Color32::from_rgb(240, 144, 72)),
        (&b"P"[..], egui::Color32::from_rgb(200, 200, 0)),
        (&b"HY"[..], egui::Color32::from_rgb(40, 170, 170)), // Aromatic
    ];
    for (residues, color) in groups {
        for &r in residues {
            map.insert(r, color);
        }
    }
    map
});

fn residue_color(symbol: u8) -> egui::Color32 {
    if symbol == GAP {
        return egui::Color32::from_gray(45);
    }
    RESIDUE_COLORS
        .get(&symbol)
        .copied()
        .unwrap_or(egui::Color32::from_gray(190))
}

const EXAMPLE_SEQUENCES: &str = r#">sp|P99999|CYC_HUMAN Cytochrome c [Homo sapiens]
MGDVEKGKKIFIMKCSQCHTVEKGGKHKTGPNLHGLFGRKTGQAPGYSYTAANKNKGIIW
GEDTLMEYLENPKKYIPGTKMIFVGIKKKEERADLIAYLKKATNE
>sp|P00004|CYC_HORSE Cytochrome c [Equus caballus]
MGDVEKGKKIFVQKCAQCHTVEKGGKHKTGPNLHGLFGRKTGQAPGFTYTDANKNKGITW
KEETLMEYLENPKKYIPGTKMIFAGIKKKTEREDLIAYLKKATNE
>sp|P00044|CYC1_YEAST Cytochrome c iso-1 [Saccharomyces cerevisiae]
MTEFKAGSAKKGATLFKTRCLQCHTVEKGGPHKVGPNLHGIFGRHSGQAEGYSYTDANIK
KNVLWDENNMSEYLTNPKKYIPGTKMAFGGLKKEKDRNDLITYLKKACE
>sp|P84029|CYC_DROME Cytochrome c-2 [Drosophila melanogaster]
MGVPAGDVEKGKKLFVQRCAQCHTVEAGGKHKVGPNLHGLIGRKTGQAAGFAYTDANKAK
GITWNEDTLFEYLENPKKYIPGTKMIFAGLKKPNERGDLIAYLKSATK
>sp|P00001|CYC_TUNA Cytochrome c [Thunnus alalunga]
MGDVAKGKKTFVQKCAQCHTVENGGKHKVGPNLWGLFGRKTGQAEGYSYTDANKSKGIVW
NENTLMEYLENPKKYIPGTKMIFAGIKKKGERQDLVAYLKSATS
"#;
