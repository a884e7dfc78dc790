use grimoire::filter::{self, FilterCriteria};
use grimoire::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn spell(name: &str, level: i32, school: SpellSchool, classes: &[&str]) -> Spell {
    Spell {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{} description", name),
        higher_level: None,
        range: "Self".to_string(),
        components: vec!["V".to_string(), "S".to_string()],
        material: None,
        ritual: false,
        duration: "Instantaneous".to_string(),
        concentration: false,
        casting_time: "1 action".to_string(),
        level,
        school,
        classes: classes.iter().map(|c| c.to_string()).collect(),
    }
}

fn names(view: &[Spell]) -> Vec<&str> {
    view.iter().map(|s| s.name.as_str()).collect()
}

speculate! {
    before {
        let mut detect = spell("Detect Magic", 1, SpellSchool::Divination, &["Cleric", "Wizard"]);
        detect.ritual = true;
        detect.concentration = true;

        let mut laughter = spell(
            "Tasha's Hideous Laughter",
            1,
            SpellSchool::Enchantment,
            &["Bard", "Wizard"],
        );
        laughter.name = "Tásha's Hideous Laughter".to_string();
        laughter.concentration = true;

        let mut fireball = spell("Fireball", 3, SpellSchool::Evocation, &["Sorcerer", "Wizard"]);
        fireball.higher_level = Some("Damage increases by 1d6 per slot level.".to_string());

        let spells = vec![
            spell("Light", 0, SpellSchool::Evocation, &["Bard", "Cleric", "Wizard"]),
            fireball,
            detect,
            laughter,
            spell("Shield", 1, SpellSchool::Abjuration, &["Sorcerer", "Wizard"]),
        ];
        let mut criteria = SpellCriteria::default();
    }

    describe "default criteria" {
        it "keep every entity sorted by name" {
            let view = filter::apply(&spells, &criteria);
            assert_eq!(
                names(&view),
                vec!["Detect Magic", "Fireball", "Light", "Shield", "Tásha's Hideous Laughter"]
            );
        }

        it "are not active" {
            assert!(!criteria.is_active());
        }
    }

    describe "search text" {
        it "ignores case" {
            criteria.search_text = "FIREBALL".to_string();
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Fireball"]);
        }

        it "ignores diacritics on either side" {
            criteria.search_text = "tasha".to_string();
            assert_eq!(
                names(&filter::apply(&spells, &criteria)),
                vec!["Tásha's Hideous Laughter"]
            );

            criteria.search_text = "TÁSHA".to_string();
            assert_eq!(filter::apply(&spells, &criteria).len(), 1);
        }

        it "searches the higher-level text" {
            criteria.search_text = "per slot level".to_string();
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Fireball"]);
        }

        it "searches class names" {
            criteria.search_text = "bard".to_string();
            assert_eq!(
                names(&filter::apply(&spells, &criteria)),
                vec!["Light", "Tásha's Hideous Laughter"]
            );
        }

        it "matches whitespace literally" {
            criteria.search_text = "  shield".to_string();
            assert!(filter::apply(&spells, &criteria).is_empty());

            criteria.search_text = "shield ".to_string();
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Shield"]);
        }

        it "treats whitespace-only text as an active constraint" {
            criteria.search_text = "   ".to_string();
            assert!(criteria.is_active());
            assert!(filter::apply(&spells, &criteria).is_empty());
        }

        it "can match nothing" {
            criteria.search_text = "meteor".to_string();
            assert!(filter::apply(&spells, &criteria).is_empty());
        }
    }

    describe "selections" {
        it "are disjunctive within a dimension" {
            criteria.toggle_school(SpellSchool::Abjuration);
            criteria.toggle_school(SpellSchool::Divination);
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Detect Magic", "Shield"]);
        }

        it "are conjunctive across dimensions" {
            criteria.toggle_level(1);
            criteria.toggle_class("Sorcerer");
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Shield"]);
        }

        it "match a class list on any shared member" {
            criteria.toggle_class("Cleric");
            criteria.toggle_class("Bard");
            assert_eq!(
                names(&filter::apply(&spells, &criteria)),
                vec!["Detect Magic", "Light", "Tásha's Hideous Laughter"]
            );
        }

        it "never match an entity with no classes" {
            let mut orphan = spell("Wish", 9, SpellSchool::Conjuration, &[]);
            orphan.classes.clear();
            criteria.toggle_class("Wizard");
            assert!(!filter::matches(&orphan, &criteria));
        }

        it "combine with search" {
            criteria.toggle_level(1);
            criteria.search_text = "magic".to_string();
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Detect Magic"]);
        }
    }

    describe "toggles" {
        it "only constrain when on" {
            criteria.toggle_concentration_only();
            assert_eq!(
                names(&filter::apply(&spells, &criteria)),
                vec!["Detect Magic", "Tásha's Hideous Laughter"]
            );

            criteria.toggle_ritual_only();
            assert_eq!(names(&filter::apply(&spells, &criteria)), vec!["Detect Magic"]);

            criteria.toggle_ritual_only();
            criteria.toggle_concentration_only();
            assert_eq!(filter::apply(&spells, &criteria).len(), spells.len());
        }

        it "leave the criteria inactive after a round trip" {
            criteria.toggle_level(3);
            assert!(criteria.is_active());
            criteria.toggle_level(3);
            assert!(!criteria.is_active());
            assert_eq!(criteria, SpellCriteria::default());
        }
    }

    describe "clear" {
        it "restores the default criteria" {
            criteria.search_text = "fire".to_string();
            criteria.toggle_school(SpellSchool::Evocation);
            criteria.toggle_ritual_only();
            criteria.clear();
            assert_eq!(criteria, SpellCriteria::default());
        }
    }

    describe "ordering" {
        it "folds case before comparing names" {
            let mut mixed = vec![
                spell("bless", 1, SpellSchool::Enchantment, &["Cleric"]),
                spell("Aid", 2, SpellSchool::Abjuration, &["Cleric"]),
                spell("Command", 1, SpellSchool::Enchantment, &["Cleric"]),
            ];
            filter::sort_by_name(&mut mixed);
            assert_eq!(names(&mixed), vec!["Aid", "bless", "Command"]);
        }

        it "keeps input order for identical names" {
            let first = spell("Alarm", 1, SpellSchool::Abjuration, &["Wizard"]);
            let mut second = spell("Alarm", 1, SpellSchool::Abjuration, &["Ranger"]);
            second.description = "second".to_string();
            let view = filter::apply(&[first.clone(), second.clone()], &criteria);
            assert_eq!(view, vec![first, second]);
        }

        it "does not depend on input order" {
            let mut reversed = spells.clone();
            reversed.reverse();
            assert_eq!(filter::apply(&reversed, &criteria), filter::apply(&spells, &criteria));
        }
    }

    describe "facets" {
        it "list distinct values from the whole collection" {
            let facets = Spell::facets(&spells);
            assert_eq!(facets.levels, vec![0, 1, 3]);
            assert_eq!(
                facets.schools,
                vec![
                    SpellSchool::Abjuration,
                    SpellSchool::Divination,
                    SpellSchool::Enchantment,
                    SpellSchool::Evocation,
                ]
            );
            assert_eq!(facets.classes, vec!["Bard", "Cleric", "Sorcerer", "Wizard"]);
        }

        it "are empty for an empty collection" {
            assert_eq!(Spell::facets(&[]), SpellFacets::default());
        }
    }

    describe "other domains" {
        it "filter feats by category and repeatability" {
            let feats = grimoire::loader::decode::<Feat>(
                "feats",
                br#"[
                    {"name": "Tough", "desc": "More hit points.", "category": "Origin"},
                    {"name": "Elemental Adept", "desc": "Ignore resistance.", "repeatable": "yes"},
                    {"name": "Alert", "desc": "Initiative.", "category": "Origin"}
                ]"#,
            )
            .expect("Decode failed");

            let mut feat_criteria = FeatCriteria::default();
            feat_criteria.toggle_category("Origin");
            let view = filter::apply(&feats, &feat_criteria);
            let view_names: Vec<&str> = view.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(view_names, vec!["Alert", "Tough"]);

            feat_criteria.clear();
            feat_criteria.toggle_repeatable_only();
            let view = filter::apply(&feats, &feat_criteria);
            assert_eq!(view.len(), 1);
            assert_eq!(view[0].name, "Elemental Adept");
            assert_eq!(view[0].category, "General");
        }

        it "filter backgrounds by skill and source" {
            let backgrounds = grimoire::loader::decode::<Background>(
                "backgrounds",
                br#"[
                    {"name": "Sage", "desc": "Scholar.",
                     "skill_proficiencies": "Arcana, History", "source": "PHB"},
                    {"name": "Acolyte", "desc": "Temple.",
                     "skill_proficiencies": "Insight, Religion"}
                ]"#,
            )
            .expect("Decode failed");

            let mut bg_criteria = BackgroundCriteria::default();
            bg_criteria.toggle_skill("History");
            bg_criteria.toggle_skill("Insight");
            assert_eq!(filter::apply(&backgrounds, &bg_criteria).len(), 2);

            bg_criteria.toggle_source("SRD");
            let view = filter::apply(&backgrounds, &bg_criteria);
            assert_eq!(view.len(), 1);
            assert_eq!(view[0].name, "Acolyte");
        }
    }
}
