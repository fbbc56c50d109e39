//! Combat domain — заряд спелла, выстрел, урон, смерть
//!
//! ECS ответственность:
//! - Charge cycle: ChargeRequested / cast intent → ChargeCycle + TaskHandle
//! - Терминальные переходы: добровольный выстрел, перегрузка, fizzle
//! - Resolution: SpellReleased → raycast → DamageDealt / EntityDied
//! - Регенерация hp/mp/endurance

use bevy::prelude::*;

use crate::SimulationSet;

pub mod charge;
pub mod damage;
pub mod spell;
pub mod stats;


pub use charge::{fire_spell, ChargeCycle, ChargeRequested, FireRequested};
pub use damage::{DamageDealt, Dead, EntityDied, SpellReleased};
pub use spell::{
    advance_charge, begin_charge, charge_progress, release_charge, rotation_speed, spell_damage,
    ChargeProfile, ChargeStep, CurrentSpell, DEFAULT_CHARGE_DURATION, INITIAL_ROTATION_SPEED,
    MAX_ROTATION_SPEED, MIN_CHARGE_SPEED, OVERLOAD_SELF_DAMAGE,
};

/// Combat Plugin
///
/// Порядок выполнения (Combat set, после Locomotion):
/// 1. start_charges — старт циклов
/// 2. advance_charges — таймеры, перегрузка
/// 3. release_charges — добровольный выстрел / fizzle
/// 4. resolve_spell_releases — raycast + урон
/// 5. detect_deaths — Dead + отмена задач
/// 6. regenerate_stats
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageDealt>()
            .add_event::<EntityDied>()
            .add_event::<SpellReleased>()
            .add_event::<ChargeRequested>()
            .add_event::<FireRequested>();

        app.add_systems(
            FixedUpdate,
            (
                charge::start_charges,
                charge::advance_charges,
                charge::release_charges,
                damage::resolve_spell_releases,
                damage::detect_deaths,
                stats::regenerate_stats,
            )
                .chain()
                .in_set(SimulationSet::Combat),
        );
    }
}
